//! Migration coordinator for the two-phase transfer protocol.
//!
//! Initiation validates the request, records a pending [`TransferJob`] keyed
//! by the primary-tier resource id (plus the staged path for uploads, so
//! several uploads may target one folder) and returns at once. The remote service
//! later calls [`StormTransferCommand::complete`], which resolves the job:
//! a reported failure discards it, success performs the file move and then
//! discards it. A job therefore completes at most once.
//!
//! Completion policy:
//! - unknown `act` values are rejected with `invalid_action`;
//! - an unresolvable `user` is rejected with `user_not_found` and the job
//!   stays pending;
//! - a non-empty `error` resolves the job as failed and answers
//!   `storm_server_error` carrying the remote message;
//! - a job whose direction differs from `act` is rejected with
//!   `invalid_action`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::domain::ports::{
    DownloadPathRequest, DownloadPathResponse, EntryKind, MoveToPrimaryRequest,
    MoveToStormRequest, RemoteMoveRequest, STATUS_CREATED, StormProvisioningClient, StormRegistry,
    StormTransferCommand, TransferAccepted, TransferCompletion, TransferCompletionRequest,
    TransferFilesystem, TransferFilesystemError, TransferJobStore, TransferJobStoreError,
};
use crate::domain::storm_sync_service::map_registry_error;
use crate::domain::{
    AccountId, EntryName, Error, JobId, KeyedLocks, PrimaryPath, StagingPath, StormAccount,
    StormServer, StormUserName, TransferDirection, TransferJob, TransferJobKey, TransferOutcome,
    keyed_locks::KeyedGuard,
};

fn map_filesystem_error(error: TransferFilesystemError) -> Error {
    match error {
        TransferFilesystemError::SourceNotFound { path } => {
            Error::transfer_source_not_found(format!("transfer source {path} does not exist"))
        }
        TransferFilesystemError::DestinationNotFound { path } => {
            Error::transfer_destination_not_found(format!(
                "transfer destination {path} does not exist or is not a folder"
            ))
        }
        TransferFilesystemError::DestinationExists { path } => {
            Error::already_exists(format!("{path} already exists"))
        }
        TransferFilesystemError::Io { message } => {
            Error::internal(format!("transfer filesystem error: {message}"))
        }
    }
}

fn map_job_store_error(error: TransferJobStoreError) -> Error {
    match error {
        TransferJobStoreError::Duplicate { job_id } => {
            Error::already_exists(format!("a transfer for {job_id} is already pending"))
        }
        TransferJobStoreError::Backend { message } => {
            Error::internal(format!("transfer job store error: {message}"))
        }
    }
}

fn parse_job_id(raw: &str) -> Result<(JobId, PrimaryPath), Error> {
    let id = JobId::parse(raw).map_err(|err| Error::invalid_jid(err.to_string()))?;
    let path = id
        .decode()
        .map_err(|err| Error::invalid_jid(format!("jid is not a resource id: {err}")))?;
    Ok((id, path))
}

fn parse_name(raw: &str) -> Result<EntryName, Error> {
    EntryName::parse(raw).map_err(|err| Error::invalid_name(err.to_string()))
}

fn parse_staging_path(raw: &str) -> Result<StagingPath, Error> {
    StagingPath::parse(raw).map_err(|err| Error::invalid_path(err.to_string()))
}

/// Pick the pending job a completion callback refers to.
///
/// Uploads are matched on the staged path as well as the job id.
fn select_job(
    pending: Vec<TransferJob>,
    jid: &JobId,
    direction: TransferDirection,
    path: &str,
) -> Result<TransferJob, Error> {
    let Some(other) = pending.first().map(|job| job.direction) else {
        return Err(Error::job_not_found(format!("no pending transfer {jid}")));
    };
    let mut same_direction = pending
        .into_iter()
        .filter(|job| job.direction == direction)
        .peekable();
    if same_direction.peek().is_none() {
        return Err(Error::invalid_action(format!(
            "transfer {jid} is {other}, not {direction}"
        )));
    }
    match direction {
        TransferDirection::ToStorm => same_direction
            .next()
            .ok_or_else(|| Error::job_not_found(format!("no pending transfer {jid}"))),
        TransferDirection::ToPrimary => {
            let staged = parse_staging_path(path)?;
            same_direction
                .find(|job| job.staging_path.as_ref() == Some(&staged))
                .ok_or_else(|| {
                    Error::invalid_path(format!(
                        "path {staged} does not match a pending transfer {jid}"
                    ))
                })
        }
    }
}

/// Coordinator implementing [`StormTransferCommand`].
#[derive(Clone)]
pub struct StormMigrationService<R, J, F, C> {
    registry: Arc<R>,
    jobs: Arc<J>,
    filesystem: Arc<F>,
    client: Arc<C>,
    account_locks: Arc<KeyedLocks<AccountId>>,
}

impl<R, J, F, C> StormMigrationService<R, J, F, C> {
    /// Create a coordinator with a private account lock table.
    pub fn new(registry: Arc<R>, jobs: Arc<J>, filesystem: Arc<F>, client: Arc<C>) -> Self {
        Self {
            registry,
            jobs,
            filesystem,
            client,
            account_locks: Arc::new(KeyedLocks::default()),
        }
    }

    /// Share the per-account lock table with the synchronisation coordinator.
    #[must_use]
    pub fn with_account_locks(mut self, locks: Arc<KeyedLocks<AccountId>>) -> Self {
        self.account_locks = locks;
        self
    }
}

impl<R, J, F, C> StormMigrationService<R, J, F, C>
where
    R: StormRegistry,
    J: TransferJobStore,
    F: TransferFilesystem,
    C: StormProvisioningClient,
{
    async fn resolve_user(&self, raw: &str) -> Result<StormAccount, Error> {
        let name = StormUserName::parse(raw)
            .ok_or_else(|| Error::user_not_found("user must not be blank"))?;
        self.registry
            .find_by_name(&name)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| Error::user_not_found(format!("storm user {name} does not exist")))
    }

    async fn resolve_owned_user(
        &self,
        requester: AccountId,
        raw: &str,
    ) -> Result<StormAccount, Error> {
        let storm = self.resolve_user(raw).await?;
        if storm.account_id != requester {
            return Err(Error::user_not_found(format!(
                "storm user {} does not belong to the requester",
                storm.name
            )));
        }
        Ok(storm)
    }

    /// Take the account lock and re-read the storm account under it, so a
    /// concurrent destroy is observed.
    async fn lock_user(&self, storm: StormAccount) -> Result<(KeyedGuard, StormAccount), Error> {
        let guard = self.account_locks.lock(storm.account_id).await;
        let current = self
            .registry
            .find_by_account(storm.account_id)
            .await
            .map_err(map_registry_error)?
            .filter(|current| current.name == storm.name)
            .ok_or_else(|| {
                Error::user_not_found(format!("storm user {} no longer exists", storm.name))
            })?;
        Ok((guard, current))
    }

    async fn server_of(&self, storm: &StormAccount) -> Result<StormServer, Error> {
        self.registry
            .find_server(storm.storm_server_id)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| {
                Error::internal(format!("storm server {} is missing", storm.storm_server_id))
            })
    }

    async fn require_kind(&self, path: &PrimaryPath, expected: EntryKind) -> Result<(), Error> {
        let kind = self
            .filesystem
            .entry_kind(path)
            .await
            .map_err(map_filesystem_error)?;
        if kind == expected {
            return Ok(());
        }
        Err(match expected {
            EntryKind::Folder => Error::transfer_destination_not_found(format!(
                "{path} does not exist or is not a folder"
            )),
            EntryKind::File | EntryKind::Missing => {
                Error::transfer_source_not_found(format!("{path} does not exist or is not a file"))
            }
        })
    }

    async fn discard(&self, key: &TransferJobKey) -> Result<(), Error> {
        self.jobs.take(key).await.map_err(map_job_store_error)?;
        Ok(())
    }

    async fn place(
        &self,
        job: &TransferJob,
        request: &TransferCompletionRequest,
    ) -> Result<(), Error> {
        let server = self
            .registry
            .find_server(job.storm_server_id)
            .await
            .map_err(map_registry_error)?
            .ok_or_else(|| {
                Error::internal(format!("storm server {} is missing", job.storm_server_id))
            })?;
        match job.direction {
            TransferDirection::ToPrimary => {
                let name = parse_name(&request.name)?;
                let Some(staged) = job.staging_path.as_ref() else {
                    return Err(Error::internal(format!(
                        "upload {} has no staged path",
                        job.id
                    )));
                };
                self.filesystem
                    .move_staged_into_primary(
                        &server.staging_root,
                        staged,
                        &job.primary_path,
                        &name,
                    )
                    .await
            }
            TransferDirection::ToStorm => {
                let folder = parse_staging_path(&request.path)?;
                self.filesystem
                    .move_primary_into_staging(
                        &job.primary_path,
                        &server.staging_root,
                        &folder,
                        &job.name,
                    )
                    .await
            }
        }
        .map_err(map_filesystem_error)
    }
}

#[async_trait]
impl<R, J, F, C> StormTransferCommand for StormMigrationService<R, J, F, C>
where
    R: StormRegistry,
    J: TransferJobStore,
    F: TransferFilesystem,
    C: StormProvisioningClient,
{
    async fn download_path(
        &self,
        request: DownloadPathRequest,
    ) -> Result<DownloadPathResponse, Error> {
        let (_, path) = parse_job_id(&request.id)?;
        self.resolve_owned_user(request.requester, &request.user)
            .await?;
        self.require_kind(&path, EntryKind::File).await?;
        let name = path
            .file_name()
            .map(|name| name.nfc().collect::<String>())
            .ok_or_else(|| Error::transfer_source_not_found("the primary root is not a file"))?;
        Ok(DownloadPathResponse {
            path: path.to_string(),
            name,
        })
    }

    async fn move_to_storm(&self, request: MoveToStormRequest) -> Result<TransferAccepted, Error> {
        let (jid, path) = parse_job_id(&request.jid)?;
        let name = parse_name(&request.name)?;
        let storm = self
            .resolve_owned_user(request.requester, &request.user)
            .await?;
        let (_guard, storm) = self.lock_user(storm).await?;
        self.require_kind(&path, EntryKind::File).await?;
        let server = self.server_of(&storm).await?;

        let remote_request = RemoteMoveRequest {
            jid: jid.to_string(),
            name: name.as_str().to_owned(),
            user: storm.name.clone(),
        };
        let job = TransferJob {
            id: jid.clone(),
            direction: TransferDirection::ToStorm,
            account_id: storm.account_id,
            storm_user: storm.name.clone(),
            storm_server_id: storm.storm_server_id,
            primary_path: path,
            name,
            staging_path: None,
        };
        let key = job.key();
        self.jobs.insert(job).await.map_err(map_job_store_error)?;

        let refusal = match self.client.move_to_storm(&server, &remote_request).await {
            Ok(STATUS_CREATED) => None,
            Ok(status) => Some(
                Error::move_to_storm_error(format!(
                    "storm server answered {status}, expected {STATUS_CREATED}"
                ))
                .with_details(json!({ "status": status })),
            ),
            Err(err) => Some(Error::move_to_storm_error(format!(
                "storm server call failed: {err}"
            ))),
        };
        if let Some(err) = refusal {
            warn!(
                jid = %jid,
                user = %storm.name,
                error = %err,
                "storm server refused transfer"
            );
            self.discard(&key).await?;
            return Err(err);
        }

        info!(jid = %jid, user = %storm.name, "toStorm transfer pending");
        Ok(TransferAccepted {
            jid,
            direction: TransferDirection::ToStorm,
        })
    }

    async fn move_to_primary(
        &self,
        request: MoveToPrimaryRequest,
    ) -> Result<TransferAccepted, Error> {
        let (jid, folder) = parse_job_id(&request.jid)?;
        let name = parse_name(&request.name)?;
        let staged = parse_staging_path(&request.path)?;
        let storm = self
            .resolve_owned_user(request.requester, &request.user)
            .await?;
        let (_guard, storm) = self.lock_user(storm).await?;
        self.require_kind(&folder, EntryKind::Folder).await?;

        self.jobs
            .insert(TransferJob {
                id: jid.clone(),
                direction: TransferDirection::ToPrimary,
                account_id: storm.account_id,
                storm_user: storm.name.clone(),
                storm_server_id: storm.storm_server_id,
                primary_path: folder,
                name,
                staging_path: Some(staged),
            })
            .await
            .map_err(map_job_store_error)?;

        info!(jid = %jid, user = %storm.name, "toPrimary transfer pending");
        Ok(TransferAccepted {
            jid,
            direction: TransferDirection::ToPrimary,
        })
    }

    async fn complete(
        &self,
        request: TransferCompletionRequest,
    ) -> Result<TransferCompletion, Error> {
        let direction: TransferDirection = request
            .act
            .parse()
            .map_err(|err: crate::domain::UnknownTransferAction| {
                Error::invalid_action(err.to_string())
            })?;
        let jid = JobId::parse(&request.jid).map_err(|err| Error::invalid_jid(err.to_string()))?;
        let storm = match self.resolve_user(&request.user).await {
            Ok(storm) => storm,
            Err(err) => {
                warn!(jid = %jid, user = %request.user, "completion callback for unknown user");
                return Err(err);
            }
        };
        let (_guard, storm) = self.lock_user(storm).await?;

        let pending: Vec<TransferJob> = self
            .jobs
            .pending(&jid)
            .await
            .map_err(map_job_store_error)?
            .into_iter()
            .filter(|job| job.storm_user == storm.name)
            .collect();
        let job = select_job(pending, &jid, direction, &request.path)?;
        let key = job.key();

        if !request.error.trim().is_empty() {
            self.discard(&key).await?;
            warn!(
                jid = %jid,
                direction = %direction,
                error = %request.error,
                "storm server reported a failed transfer"
            );
            return Err(
                Error::storm_server_error("storm server reported a failed transfer").with_details(
                    json!({
                        "jid": jid,
                        "direction": direction,
                        "outcome": TransferOutcome::Failed,
                        "error": request.error,
                    }),
                ),
            );
        }

        self.place(&job, &request).await?;
        self.discard(&key).await?;
        info!(jid = %jid, direction = %direction, "transfer completed");
        Ok(TransferCompletion {
            jid,
            direction,
            outcome: TransferOutcome::Completed,
        })
    }
}

#[cfg(test)]
#[path = "storm_migration_service_tests.rs"]
mod tests;
