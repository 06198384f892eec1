//! Diesel-backed `AccountDirectory` reading the mirrored `accounts` table.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AccountDirectory, AccountDirectoryError};
use crate::domain::{Account, AccountId};

use super::error_mapping::{directory_diesel_error, directory_pool_error};
use super::models::AccountRow;
use super::pool::DbPool;
use super::schema::accounts;

#[derive(Clone)]
pub struct DieselAccountDirectory {
    pool: DbPool,
}

impl DieselAccountDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for DieselAccountDirectory {
    async fn find_account(&self, id: AccountId) -> Result<Option<Account>, AccountDirectoryError> {
        let mut conn = self.pool.get().await.map_err(directory_pool_error)?;
        let row = accounts::table
            .find(id.get())
            .select(AccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(directory_diesel_error)?;
        Ok(row.map(Account::from))
    }
}
