//! Driven port for the remote storm provisioning service.
//!
//! Each call targets one [`StormServer`]. Adapters return the remote status
//! verbatim; deciding which status counts as success belongs to the
//! coordinators, so a non-success status is not an adapter error.

use async_trait::async_trait;

use crate::domain::{Bandrate, RemoteUserId, StormServer, StormUserName};

use super::define_port_error;

/// Status the remote service answers a successful destroy or update with.
pub const STATUS_NO_CONTENT: u16 = 204;
/// Status the remote service answers a successful bulk update with.
pub const STATUS_OK: u16 = 200;
/// Status the remote service answers an accepted transfer request with.
pub const STATUS_CREATED: u16 = 201;

/// Parameters for provisioning one remote user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRemoteUser {
    pub name: StormUserName,
    pub bandrate: Bandrate,
}

/// Remote answer to a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserReply {
    pub status: u16,
    /// Identifier assigned by the remote service, when the body carried one.
    pub user_id: Option<RemoteUserId>,
}

/// Remote answer to a bulk update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdateReply {
    pub status: u16,
    pub bandrate: Option<Bandrate>,
    pub bandwidth: Option<u64>,
}

/// Ask the remote service to fetch a primary-tier file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMoveRequest {
    pub jid: String,
    pub name: String,
    pub user: StormUserName,
}

define_port_error! {
    /// Errors surfaced while calling the provisioning service.
    pub enum StormProvisioningError {
        /// Network transport failed before receiving a response.
        Transport { message: String } => "storm transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } => "storm call timed out: {message}",
        /// Response body could not be decoded.
        Decode { message: String } => "storm response decode failed: {message}",
    }
}

/// Narrow RPC contract of the remote provisioning service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StormProvisioningClient: Send + Sync {
    /// Provision a remote user.
    async fn create_user(
        &self,
        server: &StormServer,
        request: &CreateRemoteUser,
    ) -> Result<CreateUserReply, StormProvisioningError>;

    /// Remove a remote user; success is [`STATUS_NO_CONTENT`].
    async fn destroy_user(
        &self,
        server: &StormServer,
        user_id: &RemoteUserId,
    ) -> Result<u16, StormProvisioningError>;

    /// Change one user's bandrate; success is [`STATUS_NO_CONTENT`].
    async fn update_user(
        &self,
        server: &StormServer,
        user_id: &RemoteUserId,
        bandrate: Bandrate,
    ) -> Result<u16, StormProvisioningError>;

    /// Change the bandrate of many users; success is [`STATUS_OK`].
    async fn bulk_update_users(
        &self,
        server: &StormServer,
        user_ids: &[RemoteUserId],
        bandrate: Bandrate,
    ) -> Result<BulkUpdateReply, StormProvisioningError>;

    /// Request a toStorm transfer; success is [`STATUS_CREATED`].
    async fn move_to_storm(
        &self,
        server: &StormServer,
        request: &RemoteMoveRequest,
    ) -> Result<u16, StormProvisioningError>;
}

/// Fixture implementation that accepts every call.
///
/// Remote user ids are derived from the storm user name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureStormProvisioningClient;

#[async_trait]
impl StormProvisioningClient for FixtureStormProvisioningClient {
    async fn create_user(
        &self,
        _server: &StormServer,
        request: &CreateRemoteUser,
    ) -> Result<CreateUserReply, StormProvisioningError> {
        Ok(CreateUserReply {
            status: STATUS_CREATED,
            user_id: Some(RemoteUserId::new(format!("fixture-{}", request.name))),
        })
    }

    async fn destroy_user(
        &self,
        _server: &StormServer,
        _user_id: &RemoteUserId,
    ) -> Result<u16, StormProvisioningError> {
        Ok(STATUS_NO_CONTENT)
    }

    async fn update_user(
        &self,
        _server: &StormServer,
        _user_id: &RemoteUserId,
        _bandrate: Bandrate,
    ) -> Result<u16, StormProvisioningError> {
        Ok(STATUS_NO_CONTENT)
    }

    async fn bulk_update_users(
        &self,
        _server: &StormServer,
        _user_ids: &[RemoteUserId],
        bandrate: Bandrate,
    ) -> Result<BulkUpdateReply, StormProvisioningError> {
        Ok(BulkUpdateReply {
            status: STATUS_OK,
            bandrate: Some(bandrate),
            bandwidth: Some(0),
        })
    }

    async fn move_to_storm(
        &self,
        _server: &StormServer,
        _request: &RemoteMoveRequest,
    ) -> Result<u16, StormProvisioningError> {
        Ok(STATUS_CREATED)
    }
}
