//! PostgreSQL-backed storm registry.
//!
//! Writes that touch the enterprise counter lock the enterprise row with
//! `SELECT ... FOR UPDATE` and recompute the counter from `storm_accounts`
//! inside the same transaction, so the quota check and the insert cannot
//! interleave with another commit for the same enterprise.

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::info;

use crate::domain::ports::{StormRegistry, StormRegistryError};
use crate::domain::{
    AccountId, Bandrate, Enterprise, EnterpriseId, NewStormAccount, StormAccount, StormServer,
    StormServerId, StormUserName,
};

use super::error_mapping::{DieselFailure, classify, registry_pool_error};
use super::models::{
    EnterpriseRow, NewStormAccountRow, StormAccountRow, StormServerRow, bandrate_to_column,
};
use super::pool::DbPool;
use super::schema::{enterprises, storm_accounts, storm_servers};

/// Failure inside a registry transaction.
#[derive(Debug)]
enum CommitError {
    Diesel(diesel::result::Error),
    Registry(StormRegistryError),
}

impl From<diesel::result::Error> for CommitError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Diesel(value)
    }
}

impl From<StormRegistryError> for CommitError {
    fn from(value: StormRegistryError) -> Self {
        Self::Registry(value)
    }
}

fn map_diesel_error(error: diesel::result::Error) -> StormRegistryError {
    match classify(error) {
        DieselFailure::Connection(message) => StormRegistryError::connection(message),
        DieselFailure::Query(message) => StormRegistryError::query(message),
        DieselFailure::Unique(constraint) => StormRegistryError::query(format!(
            "unique violation on {}",
            constraint.as_deref().unwrap_or("unknown constraint")
        )),
    }
}

fn map_commit_error(error: CommitError, account_id: AccountId) -> StormRegistryError {
    match error {
        CommitError::Registry(error) => error,
        CommitError::Diesel(error) => match classify(error) {
            DieselFailure::Unique(_) => StormRegistryError::duplicate(account_id),
            DieselFailure::Connection(message) => StormRegistryError::connection(message),
            DieselFailure::Query(message) => StormRegistryError::query(message),
        },
    }
}

fn counter_column(count: i64) -> Result<i32, StormRegistryError> {
    i32::try_from(count)
        .map_err(|_| StormRegistryError::query(format!("storm account count {count} overflows")))
}

/// Lock the enterprise row for the rest of the transaction.
async fn lock_enterprise(
    conn: &mut AsyncPgConnection,
    enterprise_id: EnterpriseId,
) -> Result<EnterpriseRow, CommitError> {
    enterprises::table
        .find(enterprise_id.get())
        .select(EnterpriseRow::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| StormRegistryError::enterprise_not_found(enterprise_id).into())
}

/// Recompute and store the enterprise counter; returns the new value.
async fn sync_counter(
    conn: &mut AsyncPgConnection,
    enterprise_id: EnterpriseId,
) -> Result<i64, CommitError> {
    let registered: i64 = storm_accounts::table
        .filter(storm_accounts::enterprise_id.eq(enterprise_id.get()))
        .count()
        .get_result(conn)
        .await?;
    diesel::update(enterprises::table.find(enterprise_id.get()))
        .set(enterprises::registered_storm_accounts.eq(counter_column(registered)?))
        .execute(conn)
        .await?;
    Ok(registered)
}

/// Diesel-backed [`StormRegistry`].
#[derive(Clone)]
pub struct DieselStormRegistry {
    pool: DbPool,
}

impl DieselStormRegistry {
    /// Create a registry over `pool`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use storm_backend::outbound::persistence::{DbPool, DieselStormRegistry, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/storm")).await?;
    /// let registry = DieselStormRegistry::new(pool);
    /// # let _ = registry;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StormRegistry for DieselStormRegistry {
    async fn find_enterprise(
        &self,
        id: EnterpriseId,
    ) -> Result<Option<Enterprise>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        enterprises::table
            .find(id.get())
            .select(EnterpriseRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(Enterprise::try_from)
            .transpose()
    }

    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<StormAccount>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        storm_accounts::table
            .filter(storm_accounts::account_id.eq(account_id.get()))
            .select(StormAccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(StormAccount::try_from)
            .transpose()
    }

    async fn find_by_name(
        &self,
        name: &StormUserName,
    ) -> Result<Option<StormAccount>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        storm_accounts::table
            .filter(storm_accounts::name.eq(name.as_str()))
            .select(StormAccountRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(StormAccount::try_from)
            .transpose()
    }

    async fn list_for_enterprise(
        &self,
        enterprise_id: EnterpriseId,
    ) -> Result<Vec<StormAccount>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        storm_accounts::table
            .filter(storm_accounts::enterprise_id.eq(enterprise_id.get()))
            .order(storm_accounts::account_id.asc())
            .select(StormAccountRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?
            .into_iter()
            .map(StormAccount::try_from)
            .collect()
    }

    async fn find_server(
        &self,
        id: StormServerId,
    ) -> Result<Option<StormServer>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        storm_servers::table
            .find(id.get())
            .select(StormServerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(StormServer::try_from)
            .transpose()
    }

    async fn select_server(&self) -> Result<Option<StormServer>, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        let servers: Vec<StormServerRow> = storm_servers::table
            .order(storm_servers::id.asc())
            .select(StormServerRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let loads: Vec<(i64, i64)> = storm_accounts::table
            .group_by(storm_accounts::storm_server_id)
            .select((storm_accounts::storm_server_id, count_star()))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        servers
            .into_iter()
            .min_by_key(|server| {
                let load = loads
                    .iter()
                    .find(|(id, _)| *id == server.id)
                    .map_or(0, |(_, count)| *count);
                (load, server.id)
            })
            .map(StormServer::try_from)
            .transpose()
    }

    async fn commit_create(
        &self,
        account: &NewStormAccount,
    ) -> Result<StormAccount, StormRegistryError> {
        let bandrate = bandrate_to_column(account.bandrate)?;
        let enterprise_id = account.enterprise_id;
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;

        let row = conn
            .transaction::<_, CommitError, _>(|conn| {
                async move {
                    let enterprise = lock_enterprise(conn, enterprise_id).await?;
                    let registered: i64 = storm_accounts::table
                        .filter(storm_accounts::enterprise_id.eq(enterprise_id.get()))
                        .count()
                        .get_result(conn)
                        .await?;
                    if registered >= i64::from(enterprise.max_storm_accounts) {
                        return Err(StormRegistryError::quota_exceeded(enterprise_id).into());
                    }

                    let row = diesel::insert_into(storm_accounts::table)
                        .values(&NewStormAccountRow {
                            account_id: account.account_id.get(),
                            enterprise_id: enterprise_id.get(),
                            storm_server_id: account.storm_server_id.get(),
                            remote_user_id: account.remote_user_id.as_str(),
                            name: account.name.as_str(),
                            bandrate,
                        })
                        .returning(StormAccountRow::as_returning())
                        .get_result(conn)
                        .await?;
                    sync_counter(conn, enterprise_id).await?;
                    Ok(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_commit_error(err, account.account_id))?;

        info!(
            account_id = %account.account_id,
            enterprise_id = %enterprise_id,
            "storm account stored"
        );
        StormAccount::try_from(row)
    }

    async fn commit_destroy(
        &self,
        account_id: AccountId,
    ) -> Result<StormAccount, StormRegistryError> {
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;

        let row = conn
            .transaction::<_, CommitError, _>(|conn| {
                async move {
                    let enterprise_id: i64 = storm_accounts::table
                        .filter(storm_accounts::account_id.eq(account_id.get()))
                        .select(storm_accounts::enterprise_id)
                        .first(conn)
                        .await
                        .optional()?
                        .ok_or(StormRegistryError::storm_account_not_found(account_id))?;
                    let enterprise_id = EnterpriseId::new(enterprise_id);
                    lock_enterprise(conn, enterprise_id).await?;

                    let row = diesel::delete(
                        storm_accounts::table
                            .filter(storm_accounts::account_id.eq(account_id.get())),
                    )
                    .returning(StormAccountRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(StormRegistryError::storm_account_not_found(account_id))?;
                    sync_counter(conn, enterprise_id).await?;
                    Ok(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_commit_error(err, account_id))?;

        StormAccount::try_from(row)
    }

    async fn update_bandrate(
        &self,
        account_id: AccountId,
        bandrate: Bandrate,
    ) -> Result<StormAccount, StormRegistryError> {
        let column = bandrate_to_column(bandrate)?;
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;
        let row = diesel::update(
            storm_accounts::table.filter(storm_accounts::account_id.eq(account_id.get())),
        )
        .set(storm_accounts::bandrate.eq(column))
        .returning(StormAccountRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?
        .ok_or(StormRegistryError::storm_account_not_found(account_id))?;
        StormAccount::try_from(row)
    }

    async fn bulk_update(
        &self,
        enterprise_id: EnterpriseId,
        account_ids: &[AccountId],
        bandrate: Bandrate,
    ) -> Result<Enterprise, StormRegistryError> {
        let column = bandrate_to_column(bandrate)?;
        let ids: Vec<i64> = account_ids.iter().map(|id| id.get()).collect();
        let mut conn = self.pool.get().await.map_err(registry_pool_error)?;

        let row = conn
            .transaction::<_, CommitError, _>(|conn| {
                async move {
                    lock_enterprise(conn, enterprise_id).await?;
                    diesel::update(
                        storm_accounts::table
                            .filter(storm_accounts::enterprise_id.eq(enterprise_id.get()))
                            .filter(storm_accounts::account_id.eq_any(&ids)),
                    )
                    .set(storm_accounts::bandrate.eq(column))
                    .execute(conn)
                    .await?;
                    let row = diesel::update(enterprises::table.find(enterprise_id.get()))
                        .set(enterprises::default_bandrate.eq(column))
                        .returning(EnterpriseRow::as_returning())
                        .get_result(conn)
                        .await?;
                    Ok(row)
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| match err {
                CommitError::Registry(error) => error,
                CommitError::Diesel(error) => map_diesel_error(error),
            })?;

        Enterprise::try_from(row)
    }
}
