//! Port for the storm registry, the local system of record.
//!
//! The registry maps each account to at most one remote storm identity and
//! maintains the denormalised `registered_storm_accounts` counter on the
//! owning enterprise.
//!
//! ## Atomicity
//!
//! [`StormRegistry::commit_create`] and [`StormRegistry::commit_destroy`]
//! change a `storm_accounts` row and the enterprise counter together. Adapters
//! must apply both writes in one critical section keyed by enterprise, and
//! `commit_create` must re-check the quota inside that section so concurrent
//! creates cannot push the counter past `max_storm_accounts`.

use async_trait::async_trait;

use crate::domain::{
    AccountId, Bandrate, Enterprise, EnterpriseId, NewStormAccount, StormAccount, StormServer,
    StormServerId, StormUserName,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by storm registry adapters.
    pub enum StormRegistryError {
        /// Registry connection could not be established.
        Connection { message: String } => "storm registry connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "storm registry query failed: {message}",
        /// Commit-time quota re-check failed.
        QuotaExceeded { enterprise_id: EnterpriseId } =>
            "storm quota exhausted for enterprise {enterprise_id}",
        /// A storm account already exists for the account.
        Duplicate { account_id: AccountId } =>
            "storm account already exists for account {account_id}",
        /// The enterprise row is missing.
        EnterpriseNotFound { enterprise_id: EnterpriseId } =>
            "enterprise {enterprise_id} not found",
        /// No storm account exists for the account.
        StormAccountNotFound { account_id: AccountId } =>
            "no storm account for account {account_id}",
    }
}

/// Storage for storm accounts, servers and enterprise storm state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StormRegistry: Send + Sync {
    /// Load an enterprise with its storm settings and counters.
    async fn find_enterprise(
        &self,
        id: EnterpriseId,
    ) -> Result<Option<Enterprise>, StormRegistryError>;

    /// Storm account owned by `account_id`, if any.
    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<StormAccount>, StormRegistryError>;

    /// Storm account carrying the remote login `name`, if any.
    async fn find_by_name(
        &self,
        name: &StormUserName,
    ) -> Result<Option<StormAccount>, StormRegistryError>;

    /// All storm accounts of an enterprise, ordered by account id.
    async fn list_for_enterprise(
        &self,
        enterprise_id: EnterpriseId,
    ) -> Result<Vec<StormAccount>, StormRegistryError>;

    /// Load a storm server.
    async fn find_server(
        &self,
        id: StormServerId,
    ) -> Result<Option<StormServer>, StormRegistryError>;

    /// Pick the server holding the fewest storm accounts; ties go to the
    /// lowest id. `None` when no server is registered.
    async fn select_server(&self) -> Result<Option<StormServer>, StormRegistryError>;

    /// Insert the storm account and increment the enterprise counter
    /// atomically, re-validating the quota.
    async fn commit_create(
        &self,
        account: &NewStormAccount,
    ) -> Result<StormAccount, StormRegistryError>;

    /// Delete the storm account and decrement the enterprise counter
    /// atomically. Returns the removed row.
    async fn commit_destroy(
        &self,
        account_id: AccountId,
    ) -> Result<StormAccount, StormRegistryError>;

    /// Store a new bandrate for one storm account.
    async fn update_bandrate(
        &self,
        account_id: AccountId,
        bandrate: Bandrate,
    ) -> Result<StormAccount, StormRegistryError>;

    /// Store `bandrate` on the listed storm accounts and as the enterprise
    /// default, in one transaction. Returns the updated enterprise.
    async fn bulk_update(
        &self,
        enterprise_id: EnterpriseId,
        account_ids: &[AccountId],
        bandrate: Bandrate,
    ) -> Result<Enterprise, StormRegistryError>;
}
