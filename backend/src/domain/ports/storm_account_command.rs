//! Driving port for storm account lifecycle operations.
//!
//! Bandrates arrive as raw JSON so the admission controller can tell a
//! numeric string or float apart from an integer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    AccountId, Bandrate, EnterpriseId, Error, RemoteUserId, StormAccount, StormAccountId,
    StormServerId, StormUserName,
};

/// Request to provision a storm user for an account.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStormUserRequest {
    pub requester: AccountId,
    pub account_id: AccountId,
    /// `Value::Null` selects the enterprise default.
    pub bandrate: Value,
    /// Server to place the user on; the least loaded one when absent.
    pub storm_server_id: Option<StormServerId>,
}

/// Request to remove an account's storm user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyStormUserRequest {
    pub requester: AccountId,
    pub account_id: AccountId,
}

/// Request to change one storm user's bandrate.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStormUserRequest {
    pub requester: AccountId,
    pub account_id: AccountId,
    pub bandrate: Value,
}

/// Request to change every storm user of an enterprise.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdateStormUsersRequest {
    pub requester: AccountId,
    pub enterprise_id: EnterpriseId,
    pub bandrate: Value,
}

/// Storm user returned by create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormUserResponse {
    pub account_id: AccountId,
    pub storm_user: StormAccount,
}

/// Remote status returned by destroy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyStormUserResponse {
    pub status: u16,
}

/// Outcome of an enterprise-wide update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateStormUsersResponse {
    pub enterprise_id: EnterpriseId,
    pub default_bandrate: Bandrate,
    /// Number of storm users whose bandrate changed.
    pub updated: usize,
}

/// Storm account lifecycle use-cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StormAccountCommand: Send + Sync {
    /// Provision a remote user and record it.
    async fn create(&self, request: CreateStormUserRequest) -> Result<StormUserResponse, Error>;

    /// Remove the remote user and its record.
    async fn destroy(
        &self,
        request: DestroyStormUserRequest,
    ) -> Result<DestroyStormUserResponse, Error>;

    /// Change one user's bandrate.
    async fn update(&self, request: UpdateStormUserRequest) -> Result<StormUserResponse, Error>;

    /// Change every user's bandrate and the enterprise default.
    async fn bulk_update(
        &self,
        request: BulkUpdateStormUsersRequest,
    ) -> Result<BulkUpdateStormUsersResponse, Error>;
}

/// Fixture implementation echoing requests without side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureStormAccountCommand;

fn fixture_storm_user(account_id: AccountId, bandrate: &Value) -> StormUserResponse {
    let bandrate = bandrate.as_u64().map_or(Bandrate::ZERO, Bandrate::new);
    StormUserResponse {
        account_id,
        storm_user: StormAccount {
            id: StormAccountId::new(1),
            account_id,
            enterprise_id: EnterpriseId::new(1),
            storm_server_id: StormServerId::new(1),
            remote_user_id: RemoteUserId::new("fixture"),
            name: StormUserName::for_account(account_id),
            bandrate,
        },
    }
}

#[async_trait]
impl StormAccountCommand for FixtureStormAccountCommand {
    async fn create(&self, request: CreateStormUserRequest) -> Result<StormUserResponse, Error> {
        Ok(fixture_storm_user(request.account_id, &request.bandrate))
    }

    async fn destroy(
        &self,
        _request: DestroyStormUserRequest,
    ) -> Result<DestroyStormUserResponse, Error> {
        Ok(DestroyStormUserResponse { status: 204 })
    }

    async fn update(&self, request: UpdateStormUserRequest) -> Result<StormUserResponse, Error> {
        Ok(fixture_storm_user(request.account_id, &request.bandrate))
    }

    async fn bulk_update(
        &self,
        request: BulkUpdateStormUsersRequest,
    ) -> Result<BulkUpdateStormUsersResponse, Error> {
        Ok(BulkUpdateStormUsersResponse {
            enterprise_id: request.enterprise_id,
            default_bandrate: request.bandrate.as_u64().map_or(Bandrate::ZERO, Bandrate::new),
            updated: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fixture_command_echoes_bandrate() {
        let response = FixtureStormAccountCommand
            .create(CreateStormUserRequest {
                requester: AccountId::new(1),
                account_id: AccountId::new(2),
                bandrate: json!(100),
                storm_server_id: None,
            })
            .await
            .expect("fixture create succeeds");
        assert_eq!(response.account_id, AccountId::new(2));
        assert_eq!(response.storm_user.bandrate, Bandrate::new(100));
    }
}
