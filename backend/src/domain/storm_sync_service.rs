//! Synchronisation coordinator for storm account lifecycle operations.
//!
//! Every operation runs admission first, then the remote call, then the local
//! write. A refused remote call leaves the registry untouched. The quota is
//! checked before the remote call and again inside the registry commit; if the
//! commit-time check fails the freshly provisioned remote user is destroyed on
//! a best-effort basis.
//!
//! A local write failing after a successful remote call leaves the two sides
//! disagreeing. Those cases are logged at `error` level with the remote
//! identifiers so a reconciliation sweep can find them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info, warn};

use crate::domain::admission::{admit_bulk_update, admit_create, admit_destroy, admit_update};
use crate::domain::ports::{
    AccountDirectory, AccountDirectoryError, BulkUpdateStormUsersRequest,
    BulkUpdateStormUsersResponse, CreateRemoteUser, CreateStormUserRequest,
    DestroyStormUserRequest, DestroyStormUserResponse, STATUS_NO_CONTENT, STATUS_OK,
    StormAccountCommand, StormProvisioningClient, StormProvisioningError, StormRegistry,
    StormRegistryError, StormUserResponse, UpdateStormUserRequest,
};
use crate::domain::{
    Account, AccountId, AdmissionState, Bandrate, Enterprise, EnterpriseId, Error, ErrorCode,
    KeyedLocks, NewStormAccount, RemoteUserId, StormAccount, StormServer, StormServerId,
    StormUserName,
};

pub(crate) fn map_directory_error(error: AccountDirectoryError) -> Error {
    match error {
        AccountDirectoryError::Connection { message } => {
            Error::service_unavailable(format!("account directory unavailable: {message}"))
        }
        AccountDirectoryError::Query { message } => {
            Error::internal(format!("account directory error: {message}"))
        }
    }
}

pub(crate) fn map_registry_error(error: StormRegistryError) -> Error {
    match error {
        StormRegistryError::Connection { message } => {
            Error::service_unavailable(format!("storm registry unavailable: {message}"))
        }
        StormRegistryError::QuotaExceeded { enterprise_id } => Error::storm_user_count_reached(
            format!("storm user quota reached for enterprise {enterprise_id}"),
        ),
        StormRegistryError::Duplicate { account_id } => Error::already_exists(format!(
            "a storm user already exists for account {account_id}"
        )),
        StormRegistryError::StormAccountNotFound { account_id } => {
            Error::storm_user_not_found(format!("account {account_id} has no storm user"))
        }
        other @ (StormRegistryError::Query { .. }
        | StormRegistryError::EnterpriseNotFound { .. }) => {
            Error::internal(format!("storm registry error: {other}"))
        }
    }
}

fn remote_failure(code: ErrorCode, error: &StormProvisioningError) -> Error {
    Error::new(code, format!("storm server call failed: {error}"))
}

fn unexpected_status(code: ErrorCode, expected: u16, status: u16) -> Error {
    Error::new(
        code,
        format!("storm server answered {status}, expected {expected}"),
    )
    .with_details(json!({
        "status": status,
        "expected_status": expected,
    }))
}

/// Coordinator implementing [`StormAccountCommand`].
#[derive(Clone)]
pub struct StormSyncService<D, R, C> {
    accounts: Arc<D>,
    registry: Arc<R>,
    client: Arc<C>,
    account_locks: Arc<KeyedLocks<AccountId>>,
    enterprise_locks: Arc<KeyedLocks<EnterpriseId>>,
}

impl<D, R, C> StormSyncService<D, R, C> {
    /// Create a coordinator with private lock tables.
    pub fn new(accounts: Arc<D>, registry: Arc<R>, client: Arc<C>) -> Self {
        Self {
            accounts,
            registry,
            client,
            account_locks: Arc::new(KeyedLocks::default()),
            enterprise_locks: Arc::new(KeyedLocks::default()),
        }
    }

    /// Share the per-account lock table with the migration coordinator.
    #[must_use]
    pub fn with_account_locks(mut self, locks: Arc<KeyedLocks<AccountId>>) -> Self {
        self.account_locks = locks;
        self
    }
}

struct LoadedState {
    requester: Account,
    target: Option<Account>,
    enterprise: Option<Enterprise>,
}

impl LoadedState {
    fn admission(&self) -> AdmissionState<'_> {
        AdmissionState {
            requester: &self.requester,
            target: self.target.as_ref(),
            enterprise: self.enterprise.as_ref(),
        }
    }
}

impl<D, R, C> StormSyncService<D, R, C>
where
    D: AccountDirectory,
    R: StormRegistry,
    C: StormProvisioningClient,
{
    async fn load_requester(&self, id: AccountId) -> Result<Account, Error> {
        self.accounts
            .find_account(id)
            .await
            .map_err(map_directory_error)?
            .ok_or_else(|| Error::unauthorized("session account no longer exists"))
    }

    async fn load_state(
        &self,
        requester: AccountId,
        target: AccountId,
    ) -> Result<LoadedState, Error> {
        let requester = self.load_requester(requester).await?;
        let target = self
            .accounts
            .find_account(target)
            .await
            .map_err(map_directory_error)?;
        let enterprise = self
            .registry
            .find_enterprise(requester.enterprise_id)
            .await
            .map_err(map_registry_error)?;
        Ok(LoadedState {
            requester,
            target,
            enterprise,
        })
    }

    async fn existing_storm_account(&self, account_id: AccountId) -> Result<StormAccount, Error> {
        self.registry
            .find_by_account(account_id)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| {
                Error::storm_user_not_found(format!("account {account_id} has no storm user"))
            })
    }

    async fn server_of(&self, account: &StormAccount) -> Result<StormServer, Error> {
        self.registry
            .find_server(account.storm_server_id)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| {
                Error::internal(format!(
                    "storm server {} referenced by account {} is missing",
                    account.storm_server_id, account.account_id
                ))
            })
    }

    async fn resolve_server(&self, requested: Option<StormServerId>) -> Result<StormServer, Error> {
        match requested {
            Some(id) => self
                .registry
                .find_server(id)
                .await
                .map_err(map_registry_error)?
                .ok_or_else(|| Error::invalid_request(format!("storm server {id} does not exist"))),
            None => self
                .registry
                .select_server()
                .await
                .map_err(map_registry_error)?
                .ok_or_else(|| Error::service_unavailable("no storm server is registered")),
        }
    }

    async fn compensate_create(&self, server: &StormServer, user_id: &RemoteUserId) {
        match self.client.destroy_user(server, user_id).await {
            Ok(STATUS_NO_CONTENT) => {
                info!(server = %server.id, remote_user = %user_id, "rolled back remote storm user");
            }
            Ok(status) => error!(
                server = %server.id,
                remote_user = %user_id,
                status,
                "orphaned remote storm user: rollback refused"
            ),
            Err(err) => error!(
                server = %server.id,
                remote_user = %user_id,
                error = %err,
                "orphaned remote storm user: rollback failed"
            ),
        }
    }

    async fn commit_created(
        &self,
        server: &StormServer,
        account: NewStormAccount,
    ) -> Result<StormAccount, Error> {
        match self.registry.commit_create(&account).await {
            Ok(stored) => Ok(stored),
            Err(
                err @ (StormRegistryError::QuotaExceeded { .. }
                | StormRegistryError::Duplicate { .. }),
            ) => {
                warn!(
                    account_id = %account.account_id,
                    error = %err,
                    "storm user commit rejected; compensating remote registration"
                );
                self.compensate_create(server, &account.remote_user_id).await;
                Err(map_registry_error(err))
            }
            Err(err) => {
                error!(
                    account_id = %account.account_id,
                    server = %server.id,
                    remote_user = %account.remote_user_id,
                    error = %err,
                    "remote storm user has no local record"
                );
                Err(map_registry_error(err))
            }
        }
    }

    fn group_by_server(accounts: &[StormAccount]) -> BTreeMap<StormServerId, Vec<&StormAccount>> {
        let mut groups: BTreeMap<StormServerId, Vec<&StormAccount>> = BTreeMap::new();
        for account in accounts {
            groups
                .entry(account.storm_server_id)
                .or_default()
                .push(account);
        }
        groups
    }

    /// Restore the previous bandrates on servers that already accepted a bulk
    /// update which a later server refused.
    async fn revert_bulk_update(
        &self,
        enterprise_id: EnterpriseId,
        accepted: &[(StormServer, Vec<&StormAccount>)],
    ) {
        for (server, accounts) in accepted {
            for account in accounts {
                match self
                    .client
                    .update_user(server, &account.remote_user_id, account.bandrate)
                    .await
                {
                    Ok(STATUS_NO_CONTENT) => {
                        info!(
                            enterprise_id = %enterprise_id,
                            account_id = %account.account_id,
                            "restored remote bandrate after refused bulk update"
                        );
                    }
                    Ok(status) => error!(
                        enterprise_id = %enterprise_id,
                        account_id = %account.account_id,
                        server = %server.id,
                        remote_user = %account.remote_user_id,
                        status,
                        "remote bandrate diverges from registry: restore refused"
                    ),
                    Err(err) => error!(
                        enterprise_id = %enterprise_id,
                        account_id = %account.account_id,
                        server = %server.id,
                        remote_user = %account.remote_user_id,
                        error = %err,
                        "remote bandrate diverges from registry: restore failed"
                    ),
                }
            }
        }
    }

    async fn push_bulk_update(
        &self,
        enterprise_id: EnterpriseId,
        accounts: &[StormAccount],
        bandrate: Bandrate,
    ) -> Result<(), Error> {
        let mut accepted: Vec<(StormServer, Vec<&StormAccount>)> = Vec::new();
        for (server_id, members) in Self::group_by_server(accounts) {
            match self.bulk_update_server(server_id, &members, bandrate).await {
                Ok(server) => accepted.push((server, members)),
                Err(err) => {
                    if !accepted.is_empty() {
                        warn!(
                            enterprise_id = %enterprise_id,
                            servers = accepted.len(),
                            "bulk update refused part way; restoring accepted servers"
                        );
                        self.revert_bulk_update(enterprise_id, &accepted).await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn bulk_update_server(
        &self,
        server_id: StormServerId,
        members: &[&StormAccount],
        bandrate: Bandrate,
    ) -> Result<StormServer, Error> {
        let server = self
            .registry
            .find_server(server_id)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| Error::internal(format!("storm server {server_id} is missing")))?;
        let user_ids: Vec<RemoteUserId> = members
            .iter()
            .map(|account| account.remote_user_id.clone())
            .collect();
        let reply = self
            .client
            .bulk_update_users(&server, &user_ids, bandrate)
            .await
            .map_err(|err| remote_failure(ErrorCode::BulkUpdateStormUsersError, &err))?;
        if reply.status != STATUS_OK {
            warn!(
                server = %server_id,
                status = reply.status,
                "storm server refused bulk update"
            );
            return Err(unexpected_status(
                ErrorCode::BulkUpdateStormUsersError,
                STATUS_OK,
                reply.status,
            ));
        }
        Ok(server)
    }
}

#[async_trait]
impl<D, R, C> StormAccountCommand for StormSyncService<D, R, C>
where
    D: AccountDirectory,
    R: StormRegistry,
    C: StormProvisioningClient,
{
    async fn create(&self, request: CreateStormUserRequest) -> Result<StormUserResponse, Error> {
        let _guard = self.account_locks.lock(request.account_id).await;
        let state = self
            .load_state(request.requester, request.account_id)
            .await?;
        let existing = self
            .registry
            .find_by_account(request.account_id)
            .await
            .map_err(map_registry_error)?;
        let bandrate = admit_create(&state.admission(), existing.as_ref(), &request.bandrate)?;

        let server = self.resolve_server(request.storm_server_id).await?;
        let name = StormUserName::for_account(request.account_id);
        let reply = self
            .client
            .create_user(
                &server,
                &CreateRemoteUser {
                    name: name.clone(),
                    bandrate,
                },
            )
            .await
            .map_err(|err| remote_failure(ErrorCode::CreateStormUserError, &err))?;
        let remote_user_id = match reply.user_id {
            Some(id) if (200..300).contains(&reply.status) => id,
            _ => {
                warn!(
                    account_id = %request.account_id,
                    status = reply.status,
                    "storm server refused create"
                );
                return Err(Error::create_storm_user_error(format!(
                    "storm server answered {} without a user id",
                    reply.status
                ))
                .with_details(json!({ "status": reply.status })));
            }
        };

        let stored = self
            .commit_created(
                &server,
                NewStormAccount {
                    account_id: request.account_id,
                    enterprise_id: state.requester.enterprise_id,
                    storm_server_id: server.id,
                    remote_user_id,
                    name,
                    bandrate,
                },
            )
            .await?;
        info!(
            account_id = %stored.account_id,
            server = %stored.storm_server_id,
            bandrate = %stored.bandrate,
            "storm user created"
        );
        Ok(StormUserResponse {
            account_id: request.account_id,
            storm_user: stored,
        })
    }

    async fn destroy(
        &self,
        request: DestroyStormUserRequest,
    ) -> Result<DestroyStormUserResponse, Error> {
        let _guard = self.account_locks.lock(request.account_id).await;
        let state = self
            .load_state(request.requester, request.account_id)
            .await?;
        admit_destroy(&state.admission())?;

        let existing = self.existing_storm_account(request.account_id).await?;
        let server = self.server_of(&existing).await?;
        let status = self
            .client
            .destroy_user(&server, &existing.remote_user_id)
            .await
            .map_err(|err| remote_failure(ErrorCode::DestroyStormUserError, &err))?;
        if status != STATUS_NO_CONTENT {
            warn!(account_id = %request.account_id, status, "storm server refused destroy");
            return Err(unexpected_status(
                ErrorCode::DestroyStormUserError,
                STATUS_NO_CONTENT,
                status,
            ));
        }

        self.registry
            .commit_destroy(request.account_id)
            .await
            .map_err(|err| {
                error!(
                    account_id = %request.account_id,
                    remote_user = %existing.remote_user_id,
                    error = %err,
                    "local storm user outlived its remote registration"
                );
                map_registry_error(err)
            })?;
        info!(account_id = %request.account_id, "storm user destroyed");
        Ok(DestroyStormUserResponse { status })
    }

    async fn update(&self, request: UpdateStormUserRequest) -> Result<StormUserResponse, Error> {
        let _guard = self.account_locks.lock(request.account_id).await;
        let state = self
            .load_state(request.requester, request.account_id)
            .await?;
        let bandrate = admit_update(&state.admission(), &request.bandrate)?;

        let existing = self.existing_storm_account(request.account_id).await?;
        let server = self.server_of(&existing).await?;
        let status = self
            .client
            .update_user(&server, &existing.remote_user_id, bandrate)
            .await
            .map_err(|err| remote_failure(ErrorCode::UpdateStormUserError, &err))?;
        if status != STATUS_NO_CONTENT {
            warn!(account_id = %request.account_id, status, "storm server refused update");
            return Err(unexpected_status(
                ErrorCode::UpdateStormUserError,
                STATUS_NO_CONTENT,
                status,
            ));
        }

        let stored = self
            .registry
            .update_bandrate(request.account_id, bandrate)
            .await
            .map_err(|err| {
                error!(
                    account_id = %request.account_id,
                    bandrate = %bandrate,
                    error = %err,
                    "remote bandrate changed but local update failed"
                );
                map_registry_error(err)
            })?;
        info!(account_id = %request.account_id, bandrate = %bandrate, "storm user updated");
        Ok(StormUserResponse {
            account_id: request.account_id,
            storm_user: stored,
        })
    }

    async fn bulk_update(
        &self,
        request: BulkUpdateStormUsersRequest,
    ) -> Result<BulkUpdateStormUsersResponse, Error> {
        let _enterprise_guard = self.enterprise_locks.lock(request.enterprise_id).await;
        let requester = self.load_requester(request.requester).await?;
        let enterprise = self
            .registry
            .find_enterprise(request.enterprise_id)
            .await
            .map_err(map_registry_error)?;
        let bandrate = admit_bulk_update(
            &requester,
            request.enterprise_id,
            enterprise.as_ref(),
            &request.bandrate,
        )?;

        let listed = self
            .registry
            .list_for_enterprise(request.enterprise_id)
            .await
            .map_err(map_registry_error)?;
        let locked: BTreeSet<AccountId> = listed.iter().map(|account| account.account_id).collect();
        let _account_guards = self
            .account_locks
            .lock_all(locked.iter().copied().collect())
            .await;
        // Re-read under the account locks; accounts created meanwhile keep
        // their own bandrate.
        let accounts: Vec<StormAccount> = self
            .registry
            .list_for_enterprise(request.enterprise_id)
            .await
            .map_err(map_registry_error)?
            .into_iter()
            .filter(|account| locked.contains(&account.account_id))
            .collect();

        self.push_bulk_update(request.enterprise_id, &accounts, bandrate).await?;

        let account_ids: Vec<AccountId> =
            accounts.iter().map(|account| account.account_id).collect();
        let updated = self
            .registry
            .bulk_update(request.enterprise_id, &account_ids, bandrate)
            .await
            .map_err(|err| {
                error!(
                    enterprise_id = %request.enterprise_id,
                    bandrate = %bandrate,
                    error = %err,
                    "remote bandrates changed but local bulk update failed"
                );
                map_registry_error(err)
            })?;
        info!(
            enterprise_id = %request.enterprise_id,
            bandrate = %bandrate,
            accounts = account_ids.len(),
            "storm users bulk updated"
        );
        Ok(BulkUpdateStormUsersResponse {
            enterprise_id: updated.id,
            default_bandrate: updated.settings.default_bandrate,
            updated: account_ids.len(),
        })
    }
}

#[cfg(test)]
#[path = "storm_sync_service_tests.rs"]
mod tests;
