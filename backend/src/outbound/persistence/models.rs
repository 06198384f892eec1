//! Internal Diesel row structs for the storm registry tables.
//!
//! Rows never leave the persistence layer; conversions into domain types
//! live here so the repositories stay thin.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::ports::StormRegistryError;
use crate::domain::{
    Account, AccountId, Bandrate, Enterprise, EnterpriseId, RemoteUserId, Role, StormAccount,
    StormAccountId, StormServer, StormServerId, StormSettings, StormUserName,
};

use super::schema::{accounts, enterprises, storm_accounts, storm_servers};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = enterprises)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EnterpriseRow {
    pub id: i64,
    pub storm_enabled: bool,
    pub default_bandrate: i64,
    pub max_storm_accounts: i32,
    pub registered_storm_accounts: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AccountRow {
    pub id: i64,
    pub enterprise_id: i64,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = storm_servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StormServerRow {
    pub id: i64,
    pub endpoint: String,
    pub staging_root: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = storm_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StormAccountRow {
    pub id: i64,
    pub account_id: i64,
    pub enterprise_id: i64,
    pub storm_server_id: i64,
    pub remote_user_id: String,
    pub name: String,
    pub bandrate: i64,
    #[expect(dead_code, reason = "audit column, not surfaced to the domain")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = storm_accounts)]
pub(crate) struct NewStormAccountRow<'a> {
    pub account_id: i64,
    pub enterprise_id: i64,
    pub storm_server_id: i64,
    pub remote_user_id: &'a str,
    pub name: &'a str,
    pub bandrate: i64,
}

/// Bandrates are stored as `BIGINT`.
pub(crate) fn bandrate_to_column(bandrate: Bandrate) -> Result<i64, StormRegistryError> {
    i64::try_from(bandrate.get())
        .map_err(|_| StormRegistryError::query(format!("bandrate {bandrate} overflows BIGINT")))
}

fn bandrate_from_column(raw: i64) -> Result<Bandrate, StormRegistryError> {
    u64::try_from(raw)
        .map(Bandrate::new)
        .map_err(|_| StormRegistryError::query(format!("stored bandrate {raw} is negative")))
}

fn counter_from_column(raw: i32, column: &str) -> Result<u32, StormRegistryError> {
    u32::try_from(raw)
        .map_err(|_| StormRegistryError::query(format!("stored {column} {raw} is negative")))
}

impl TryFrom<EnterpriseRow> for Enterprise {
    type Error = StormRegistryError;

    fn try_from(row: EnterpriseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: EnterpriseId::new(row.id),
            settings: StormSettings {
                storm_enabled: row.storm_enabled,
                default_bandrate: bandrate_from_column(row.default_bandrate)?,
            },
            max_storm_accounts: counter_from_column(row.max_storm_accounts, "quota")?,
            registered_storm_accounts: counter_from_column(
                row.registered_storm_accounts,
                "counter",
            )?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: AccountId::new(row.id),
            enterprise_id: EnterpriseId::new(row.enterprise_id),
            role: Role::from_label(&row.role),
        }
    }
}

impl TryFrom<StormServerRow> for StormServer {
    type Error = StormRegistryError;

    fn try_from(row: StormServerRow) -> Result<Self, Self::Error> {
        let endpoint = url::Url::parse(&row.endpoint).map_err(|err| {
            StormRegistryError::query(format!("storm server {} endpoint: {err}", row.id))
        })?;
        Ok(Self {
            id: StormServerId::new(row.id),
            endpoint,
            staging_root: PathBuf::from(row.staging_root),
        })
    }
}

impl TryFrom<StormAccountRow> for StormAccount {
    type Error = StormRegistryError;

    fn try_from(row: StormAccountRow) -> Result<Self, Self::Error> {
        let name = StormUserName::parse(&row.name).ok_or_else(|| {
            StormRegistryError::query(format!("storm account {} has a blank name", row.id))
        })?;
        Ok(Self {
            id: StormAccountId::new(row.id),
            account_id: AccountId::new(row.account_id),
            enterprise_id: EnterpriseId::new(row.enterprise_id),
            storm_server_id: StormServerId::new(row.storm_server_id),
            remote_user_id: RemoteUserId::new(row.remote_user_id),
            name,
            bandrate: bandrate_from_column(row.bandrate)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn enterprise_row(default_bandrate: i64, max: i32) -> EnterpriseRow {
        EnterpriseRow {
            id: 7,
            storm_enabled: true,
            default_bandrate,
            max_storm_accounts: max,
            registered_storm_accounts: 1,
        }
    }

    #[rstest]
    fn enterprise_rows_convert() {
        let enterprise = Enterprise::try_from(enterprise_row(50, 3)).expect("valid row");

        assert_eq!(enterprise.id, EnterpriseId::new(7));
        assert_eq!(enterprise.settings.default_bandrate, Bandrate::new(50));
        assert_eq!(enterprise.max_storm_accounts, 3);
        assert!(enterprise.has_storm_capacity());
    }

    #[rstest]
    #[case(enterprise_row(-1, 3))]
    #[case(enterprise_row(0, -3))]
    fn negative_columns_are_rejected(#[case] row: EnterpriseRow) {
        let err = Enterprise::try_from(row).expect_err("negative column");
        assert!(matches!(err, StormRegistryError::Query { .. }));
    }

    #[rstest]
    fn malformed_endpoints_are_query_errors() {
        let err = StormServer::try_from(StormServerRow {
            id: 1,
            endpoint: "not a url".into(),
            staging_root: "/srv".into(),
        })
        .expect_err("bad endpoint");
        assert!(err.to_string().contains("storm server 1"));
    }

    #[rstest]
    fn oversized_bandrates_do_not_fit_the_column() {
        assert!(bandrate_to_column(Bandrate::new(u64::MAX)).is_err());
        assert_eq!(bandrate_to_column(Bandrate::new(9)).ok(), Some(9));
    }
}
