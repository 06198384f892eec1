//! Port for resolving accounts and their roles.
//!
//! Accounts are owned by the authentication collaborator; the storm core
//! only reads them.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Account, AccountId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by account directory adapters.
    pub enum AccountDirectoryError {
        /// Directory connection could not be established.
        Connection { message: String } => "account directory connection failed: {message}",
        /// Lookup failed during execution.
        Query { message: String } => "account directory query failed: {message}",
    }
}

/// Read access to accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Fetch an account by id; `None` when it does not exist.
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, AccountDirectoryError>;
}

/// Fixed set of accounts for tests and database-less runs.
#[derive(Debug, Default, Clone)]
pub struct FixtureAccountDirectory {
    accounts: HashMap<AccountId, Account>,
}

impl FixtureAccountDirectory {
    /// Build a directory holding `accounts`.
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.id, account))
                .collect(),
        }
    }
}

#[async_trait]
impl AccountDirectory for FixtureAccountDirectory {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, AccountDirectoryError> {
        Ok(self.accounts.get(&id).cloned())
    }
}
