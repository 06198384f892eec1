//! Storm migration HTTP handlers.
//!
//! ```text
//! GET  /storm/download_path/{id}?user=
//! POST /storm/move_to_storm
//! POST /storm/move_to_primary
//! POST /storm/move_finished
//! ```
//!
//! Initiations return as soon as the job is recorded. The storm server
//! reports the outcome later through `move_finished`.

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ports::{
    DownloadPathRequest, DownloadPathResponse, MoveToPrimaryRequest, MoveToStormRequest,
    TransferAccepted, TransferCompletion, TransferCompletionRequest,
};
use crate::domain::TransferOutcome;
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Query string of the download path lookup.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadPathQuery {
    /// Storm user name of the requester.
    #[serde(default)]
    #[param(example = "acct-42")]
    pub user: String,
}

/// Download location of a primary-tier file.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadPathBody {
    #[schema(example = "/reports/q3.pdf")]
    pub path: String,
    /// NFC-normalised file name.
    #[schema(example = "q3.pdf")]
    pub name: String,
}

impl From<DownloadPathResponse> for DownloadPathBody {
    fn from(value: DownloadPathResponse) -> Self {
        Self {
            path: value.path,
            name: value.name,
        }
    }
}

/// Request payload for moving a primary file to the storm tier.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct MoveToStormBody {
    /// Resource id of the file.
    #[serde(default)]
    pub jid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user: String,
}

/// Request payload for placing staged content into a primary folder.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct MoveToPrimaryBody {
    /// Resource id of the destination folder.
    #[serde(default)]
    pub jid: String,
    #[serde(default)]
    pub name: String,
    /// Staging path relative to the storm server's staging root.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub user: String,
}

/// Pending job created by an initiation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferAcceptedBody {
    pub jid: String,
    #[schema(example = "move_to_storm")]
    pub act: String,
}

impl From<TransferAccepted> for TransferAcceptedBody {
    fn from(value: TransferAccepted) -> Self {
        Self {
            jid: value.jid.as_str().to_owned(),
            act: value.direction.action().to_owned(),
        }
    }
}

/// Completion callback sent by the storm server.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct MoveFinishedBody {
    /// `move_to_storm` or `move_to_primary`.
    #[serde(default)]
    pub act: String,
    #[serde(default)]
    pub jid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub user: String,
    /// Remote failure message; empty on success.
    #[serde(default)]
    pub error: String,
}

/// Resolution of a completed job.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransferCompletionBody {
    pub jid: String,
    pub act: String,
    #[schema(example = "completed")]
    pub outcome: String,
}

impl From<TransferCompletion> for TransferCompletionBody {
    fn from(value: TransferCompletion) -> Self {
        let outcome = match value.outcome {
            TransferOutcome::Completed => "completed",
            TransferOutcome::Failed => "failed",
        };
        Self {
            jid: value.jid.as_str().to_owned(),
            act: value.direction.action().to_owned(),
            outcome: outcome.to_owned(),
        }
    }
}

/// Resolve where a primary-tier file can be downloaded from.
#[utoipa::path(
    get,
    path = "/storm/download_path/{id}",
    params(("id" = String, Path, description = "Resource id of the file"), DownloadPathQuery),
    responses(
        (status = 200, description = "Download location", body = DownloadPathBody),
        (status = 400, description = "Unknown user, bad id or not a file", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema)
    ),
    tags = ["storm-transfers"],
    operation_id = "stormDownloadPath",
    security(("SessionCookie" = []))
)]
#[get("/storm/download_path/{id}")]
pub async fn download_path(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<String>,
    query: web::Query<DownloadPathQuery>,
) -> ApiResult<web::Json<DownloadPathBody>> {
    let requester = session.require_account_id()?;
    let response = state
        .transfers
        .download_path(DownloadPathRequest {
            requester,
            id: path.into_inner(),
            user: query.into_inner().user,
        })
        .await?;
    Ok(web::Json(response.into()))
}

/// Start moving a primary-tier file to the storm tier.
#[utoipa::path(
    post,
    path = "/storm/move_to_storm",
    request_body = MoveToStormBody,
    responses(
        (status = 200, description = "Transfer requested", body = TransferAcceptedBody),
        (status = 400, description = "Invalid input or pending transfer", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Storm server refused the transfer", body = ErrorSchema)
    ),
    tags = ["storm-transfers"],
    operation_id = "moveToStorm",
    security(("SessionCookie" = []))
)]
#[post("/storm/move_to_storm")]
pub async fn move_to_storm(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<MoveToStormBody>,
) -> ApiResult<web::Json<TransferAcceptedBody>> {
    let requester = session.require_account_id()?;
    let MoveToStormBody { jid, name, user } = payload.into_inner();
    let accepted = state
        .transfers
        .move_to_storm(MoveToStormRequest {
            requester,
            jid,
            name,
            user,
        })
        .await?;
    Ok(web::Json(accepted.into()))
}

/// Start placing staged storm content into a primary-tier folder.
#[utoipa::path(
    post,
    path = "/storm/move_to_primary",
    request_body = MoveToPrimaryBody,
    responses(
        (status = 200, description = "Transfer recorded", body = TransferAcceptedBody),
        (status = 400, description = "Invalid input or pending transfer", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema)
    ),
    tags = ["storm-transfers"],
    operation_id = "moveToPrimary",
    security(("SessionCookie" = []))
)]
#[post("/storm/move_to_primary")]
pub async fn move_to_primary(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<MoveToPrimaryBody>,
) -> ApiResult<web::Json<TransferAcceptedBody>> {
    let requester = session.require_account_id()?;
    let MoveToPrimaryBody {
        jid,
        name,
        path,
        user,
    } = payload.into_inner();
    let accepted = state
        .transfers
        .move_to_primary(MoveToPrimaryRequest {
            requester,
            jid,
            name,
            path,
            user,
        })
        .await?;
    Ok(web::Json(accepted.into()))
}

/// Completion callback from the storm server.
///
/// The storm server authenticates at the network layer, so this route does
/// not read the session.
#[utoipa::path(
    post,
    path = "/storm/move_finished",
    request_body = MoveFinishedBody,
    responses(
        (status = 200, description = "Job resolved", body = TransferCompletionBody),
        (status = 400, description = "Rejected callback or remote failure", body = ErrorSchema)
    ),
    tags = ["storm-transfers"],
    operation_id = "moveFinished",
    security([])
)]
#[post("/storm/move_finished")]
pub async fn move_finished(
    state: web::Data<HttpState>,
    payload: web::Json<MoveFinishedBody>,
) -> ApiResult<web::Json<TransferCompletionBody>> {
    let MoveFinishedBody {
        act,
        jid,
        name,
        path,
        user,
        error,
    } = payload.into_inner();
    let completion = state
        .transfers
        .complete(TransferCompletionRequest {
            act,
            jid,
            name,
            path,
            user,
            error,
        })
        .await?;
    Ok(web::Json(completion.into()))
}

#[cfg(test)]
#[path = "storm_transfers_tests.rs"]
mod tests;
