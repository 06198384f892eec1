//! Driving port for the two-phase migration protocol.
//!
//! Initiation records a pending job and returns immediately. The remote
//! service later reports the outcome through [`StormTransferCommand::complete`].
//! Request fields stay raw strings; validation and error codes are the
//! coordinator's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Error, JobId, TransferDirection, TransferOutcome};

/// Resolve the download location of a primary-tier file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPathRequest {
    pub requester: AccountId,
    /// Resource id of the file.
    pub id: String,
    /// Storm user name of the requester.
    pub user: String,
}

/// Primary-relative path and display name of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadPathResponse {
    pub path: String,
    pub name: String,
}

/// Start moving a primary-tier file to the storm tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveToStormRequest {
    pub requester: AccountId,
    /// Resource id of the file leaving the primary tier.
    pub jid: String,
    /// Name the file takes in the staging area.
    pub name: String,
    pub user: String,
}

/// Start placing staged storm content into a primary-tier folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveToPrimaryRequest {
    pub requester: AccountId,
    /// Resource id of the destination folder.
    pub jid: String,
    /// Name the content takes in the destination folder.
    pub name: String,
    /// Staging path relative to the server's staging root.
    pub path: String,
    pub user: String,
}

/// Pending job created by an initiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAccepted {
    pub jid: JobId,
    pub direction: TransferDirection,
}

/// Completion callback payload sent by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCompletionRequest {
    pub act: String,
    pub jid: String,
    pub name: String,
    pub path: String,
    pub user: String,
    /// Remote failure message; empty on success.
    pub error: String,
}

/// Resolution of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCompletion {
    pub jid: JobId,
    pub direction: TransferDirection,
    pub outcome: TransferOutcome,
}

/// Migration use-cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StormTransferCommand: Send + Sync {
    /// Resolve where a file can be downloaded from.
    async fn download_path(
        &self,
        request: DownloadPathRequest,
    ) -> Result<DownloadPathResponse, Error>;

    /// Initiate a toStorm transfer.
    async fn move_to_storm(&self, request: MoveToStormRequest) -> Result<TransferAccepted, Error>;

    /// Initiate a toPrimary transfer.
    async fn move_to_primary(
        &self,
        request: MoveToPrimaryRequest,
    ) -> Result<TransferAccepted, Error>;

    /// Resolve a pending job from the remote callback.
    async fn complete(
        &self,
        request: TransferCompletionRequest,
    ) -> Result<TransferCompletion, Error>;
}

/// Fixture implementation accepting every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureStormTransferCommand;

fn fixture_job_id(raw: &str) -> Result<JobId, Error> {
    JobId::parse(raw).map_err(|err| Error::invalid_jid(err.to_string()))
}

#[async_trait]
impl StormTransferCommand for FixtureStormTransferCommand {
    async fn download_path(
        &self,
        request: DownloadPathRequest,
    ) -> Result<DownloadPathResponse, Error> {
        Ok(DownloadPathResponse {
            path: format!("/{}", request.id),
            name: request.id,
        })
    }

    async fn move_to_storm(&self, request: MoveToStormRequest) -> Result<TransferAccepted, Error> {
        Ok(TransferAccepted {
            jid: fixture_job_id(&request.jid)?,
            direction: TransferDirection::ToStorm,
        })
    }

    async fn move_to_primary(
        &self,
        request: MoveToPrimaryRequest,
    ) -> Result<TransferAccepted, Error> {
        Ok(TransferAccepted {
            jid: fixture_job_id(&request.jid)?,
            direction: TransferDirection::ToPrimary,
        })
    }

    async fn complete(
        &self,
        request: TransferCompletionRequest,
    ) -> Result<TransferCompletion, Error> {
        let direction = request
            .act
            .parse()
            .map_err(|err: crate::domain::UnknownTransferAction| {
                Error::invalid_action(err.to_string())
            })?;
        Ok(TransferCompletion {
            jid: fixture_job_id(&request.jid)?,
            direction,
            outcome: TransferOutcome::Completed,
        })
    }
}
