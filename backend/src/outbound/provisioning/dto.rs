//! Wire bodies exchanged with the storm provisioning service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Bandrate, RemoteUserId};

#[derive(Debug, Serialize)]
pub(super) struct CreateUserBody<'a> {
    pub(super) name: &'a str,
    pub(super) bandrate: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct UpdateUserBody {
    pub(super) bandrate: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkUpdateBody<'a> {
    pub(super) user_ids: Vec<&'a str>,
    pub(super) bandrate: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct MoveBody<'a> {
    pub(super) jid: &'a str,
    pub(super) name: &'a str,
    pub(super) user: &'a str,
}

/// Create reply; the id may arrive as a string or a number.
#[derive(Debug, Deserialize)]
pub(super) struct CreateUserReplyDto {
    #[serde(default)]
    user_id: Value,
}

impl CreateUserReplyDto {
    pub(super) fn into_user_id(self) -> Option<RemoteUserId> {
        RemoteUserId::from_json(&self.user_id)
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkUpdateReplyDto {
    #[serde(default)]
    pub(super) bandrate: Option<u64>,
    #[serde(default)]
    pub(super) bandwidth: Option<u64>,
}

impl BulkUpdateReplyDto {
    pub(super) fn bandrate(&self) -> Option<Bandrate> {
        self.bandrate.map(Bandrate::new)
    }
}
