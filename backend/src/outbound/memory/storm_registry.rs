//! In-memory storm registry for tests and database-less runs.
//!
//! Every operation runs under one mutex, which gives `commit_create` and
//! `commit_destroy` the same all-or-nothing behaviour as the PostgreSQL
//! transaction: the quota check, the row write and the counter update are
//! observed together.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::domain::ports::{StormRegistry, StormRegistryError};
use crate::domain::{
    AccountId, Bandrate, Enterprise, EnterpriseId, NewStormAccount, StormAccount, StormAccountId,
    StormServer, StormServerId, StormUserName,
};

#[derive(Debug, Default)]
struct RegistryState {
    enterprises: BTreeMap<EnterpriseId, Enterprise>,
    servers: BTreeMap<StormServerId, StormServer>,
    accounts: BTreeMap<AccountId, StormAccount>,
    next_id: i64,
}

impl RegistryState {
    fn registered_in(&self, enterprise_id: EnterpriseId) -> u32 {
        let count = self
            .accounts
            .values()
            .filter(|account| account.enterprise_id == enterprise_id)
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn sync_counter(&mut self, enterprise_id: EnterpriseId) {
        let registered = self.registered_in(enterprise_id);
        if let Some(enterprise) = self.enterprises.get_mut(&enterprise_id) {
            enterprise.registered_storm_accounts = registered;
        }
    }

    fn load_of(&self, server_id: StormServerId) -> usize {
        self.accounts
            .values()
            .filter(|account| account.storm_server_id == server_id)
            .count()
    }
}

/// Mutex-guarded [`StormRegistry`].
#[derive(Debug, Default)]
pub struct InMemoryStormRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryStormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace an enterprise. Its counter is recomputed from the
    /// stored storm accounts.
    pub fn insert_enterprise(&self, enterprise: Enterprise) {
        let mut state = self.state();
        let id = enterprise.id;
        state.enterprises.insert(id, enterprise);
        state.sync_counter(id);
    }

    /// Register a storm server.
    pub fn insert_server(&self, server: StormServer) {
        self.state().servers.insert(server.id, server);
    }

    /// Builder form of [`Self::insert_enterprise`].
    #[must_use]
    pub fn with_enterprise(self, enterprise: Enterprise) -> Self {
        self.insert_enterprise(enterprise);
        self
    }

    /// Builder form of [`Self::insert_server`].
    #[must_use]
    pub fn with_server(self, server: StormServer) -> Self {
        self.insert_server(server);
        self
    }
}

#[async_trait]
impl StormRegistry for InMemoryStormRegistry {
    async fn find_enterprise(
        &self,
        id: EnterpriseId,
    ) -> Result<Option<Enterprise>, StormRegistryError> {
        Ok(self.state().enterprises.get(&id).cloned())
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<StormAccount>, StormRegistryError> {
        Ok(self.state().accounts.get(&account_id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &StormUserName,
    ) -> Result<Option<StormAccount>, StormRegistryError> {
        Ok(self
            .state()
            .accounts
            .values()
            .find(|account| account.name == *name)
            .cloned())
    }

    async fn list_for_enterprise(
        &self,
        enterprise_id: EnterpriseId,
    ) -> Result<Vec<StormAccount>, StormRegistryError> {
        Ok(self
            .state()
            .accounts
            .values()
            .filter(|account| account.enterprise_id == enterprise_id)
            .cloned()
            .collect())
    }

    async fn find_server(
        &self,
        id: StormServerId,
    ) -> Result<Option<StormServer>, StormRegistryError> {
        Ok(self.state().servers.get(&id).cloned())
    }

    async fn select_server(&self) -> Result<Option<StormServer>, StormRegistryError> {
        let state = self.state();
        Ok(state
            .servers
            .values()
            .min_by_key(|server| (state.load_of(server.id), server.id))
            .cloned())
    }

    async fn commit_create(
        &self,
        account: &NewStormAccount,
    ) -> Result<StormAccount, StormRegistryError> {
        let mut state = self.state();
        let enterprise = state
            .enterprises
            .get(&account.enterprise_id)
            .ok_or(StormRegistryError::enterprise_not_found(account.enterprise_id))?;
        if state.registered_in(account.enterprise_id) >= enterprise.max_storm_accounts {
            return Err(StormRegistryError::quota_exceeded(account.enterprise_id));
        }
        let name_taken = state
            .accounts
            .values()
            .any(|existing| existing.name == account.name);
        if name_taken || state.accounts.contains_key(&account.account_id) {
            return Err(StormRegistryError::duplicate(account.account_id));
        }

        state.next_id += 1;
        let stored = StormAccount {
            id: StormAccountId::new(state.next_id),
            account_id: account.account_id,
            enterprise_id: account.enterprise_id,
            storm_server_id: account.storm_server_id,
            remote_user_id: account.remote_user_id.clone(),
            name: account.name.clone(),
            bandrate: account.bandrate,
        };
        state.accounts.insert(account.account_id, stored.clone());
        state.sync_counter(account.enterprise_id);
        info!(
            account_id = %account.account_id,
            enterprise_id = %account.enterprise_id,
            "storm account stored"
        );
        Ok(stored)
    }

    async fn commit_destroy(
        &self,
        account_id: AccountId,
    ) -> Result<StormAccount, StormRegistryError> {
        let mut state = self.state();
        let removed = state
            .accounts
            .remove(&account_id)
            .ok_or(StormRegistryError::storm_account_not_found(account_id))?;
        state.sync_counter(removed.enterprise_id);
        Ok(removed)
    }

    async fn update_bandrate(
        &self,
        account_id: AccountId,
        bandrate: Bandrate,
    ) -> Result<StormAccount, StormRegistryError> {
        let mut state = self.state();
        let account = state
            .accounts
            .get_mut(&account_id)
            .ok_or(StormRegistryError::storm_account_not_found(account_id))?;
        account.bandrate = bandrate;
        Ok(account.clone())
    }

    async fn bulk_update(
        &self,
        enterprise_id: EnterpriseId,
        account_ids: &[AccountId],
        bandrate: Bandrate,
    ) -> Result<Enterprise, StormRegistryError> {
        let mut state = self.state();
        if !state.enterprises.contains_key(&enterprise_id) {
            return Err(StormRegistryError::enterprise_not_found(enterprise_id));
        }
        for account in state.accounts.values_mut() {
            if account.enterprise_id == enterprise_id && account_ids.contains(&account.account_id) {
                account.bandrate = bandrate;
            }
        }
        let enterprise = state
            .enterprises
            .get_mut(&enterprise_id)
            .ok_or(StormRegistryError::enterprise_not_found(enterprise_id))?;
        enterprise.settings.default_bandrate = bandrate;
        Ok(enterprise.clone())
    }
}
