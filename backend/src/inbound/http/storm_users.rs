//! Storm user lifecycle HTTP handlers.
//!
//! ```text
//! POST   /storm_users/{account_id}
//! DELETE /storm_users/{account_id}
//! PATCH  /storm_users/{account_id}
//! PATCH  /enterprises/{enterprise_id}/storm_users/settings
//! ```
//!
//! Bandrates are forwarded as raw JSON; the admission controller decides
//! what counts as a valid integer.

use actix_web::{delete, patch, post, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::ports::{
    BulkUpdateStormUsersRequest, BulkUpdateStormUsersResponse, CreateStormUserRequest,
    DestroyStormUserRequest, DestroyStormUserResponse, StormUserResponse, UpdateStormUserRequest,
};
use crate::domain::{AccountId, EnterpriseId, StormServerId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Request payload for provisioning a storm user.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CreateStormUserBody {
    /// Non-negative integer; `null` or absent selects the enterprise default.
    #[serde(default)]
    #[schema(value_type = Option<u64>, example = 1000)]
    pub bandrate: Value,
    /// Server to place the user on; the least loaded one when absent.
    #[serde(default)]
    pub storm_server_id: Option<i64>,
}

/// Request payload carrying a new bandrate.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct BandrateBody {
    #[serde(default)]
    #[schema(value_type = u64, example = 2000)]
    pub bandrate: Value,
}

/// Storm user record returned by create and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StormUserBody {
    pub id: i64,
    pub account_id: i64,
    pub enterprise_id: i64,
    pub storm_server_id: i64,
    pub remote_user_id: String,
    #[schema(example = "acct-42")]
    pub name: String,
    pub bandrate: u64,
}

/// Response payload for create and update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StormUserResponseBody {
    pub account_id: i64,
    pub storm_user: StormUserBody,
}

impl From<StormUserResponse> for StormUserResponseBody {
    fn from(value: StormUserResponse) -> Self {
        let user = value.storm_user;
        Self {
            account_id: value.account_id.get(),
            storm_user: StormUserBody {
                id: user.id.get(),
                account_id: user.account_id.get(),
                enterprise_id: user.enterprise_id.get(),
                storm_server_id: user.storm_server_id.get(),
                remote_user_id: user.remote_user_id.as_str().to_owned(),
                name: user.name.as_str().to_owned(),
                bandrate: user.bandrate.get(),
            },
        }
    }
}

/// Response payload for destroy: the remote status code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct DestroyStormUserResponseBody {
    #[schema(example = 204)]
    pub status: u16,
}

impl From<DestroyStormUserResponse> for DestroyStormUserResponseBody {
    fn from(value: DestroyStormUserResponse) -> Self {
        Self {
            status: value.status,
        }
    }
}

/// Response payload for the enterprise-wide update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct BulkUpdateResponseBody {
    pub enterprise_id: i64,
    /// New enterprise default bandrate.
    pub default_bandrate: u64,
    /// Number of storm users whose bandrate changed.
    pub updated: usize,
}

impl From<BulkUpdateStormUsersResponse> for BulkUpdateResponseBody {
    fn from(value: BulkUpdateStormUsersResponse) -> Self {
        Self {
            enterprise_id: value.enterprise_id.get(),
            default_bandrate: value.default_bandrate.get(),
            updated: value.updated,
        }
    }
}

/// Provision a storm user for an account.
#[utoipa::path(
    post,
    path = "/storm_users/{account_id}",
    params(("account_id" = i64, Path, description = "Account receiving the storm user")),
    request_body = CreateStormUserBody,
    responses(
        (status = 200, description = "Storm user created", body = StormUserResponseBody),
        (status = 400, description = "Admission refused or invalid input", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Storm server refused the user", body = ErrorSchema),
        (status = 503, description = "No storm server available", body = ErrorSchema)
    ),
    tags = ["storm-users"],
    operation_id = "createStormUser",
    security(("SessionCookie" = []))
)]
#[post("/storm_users/{account_id}")]
pub async fn create_storm_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
    payload: web::Json<CreateStormUserBody>,
) -> ApiResult<web::Json<StormUserResponseBody>> {
    let requester = session.require_account_id()?;
    let CreateStormUserBody {
        bandrate,
        storm_server_id,
    } = payload.into_inner();
    let response = state
        .storm_users
        .create(CreateStormUserRequest {
            requester,
            account_id: AccountId::new(path.into_inner()),
            bandrate,
            storm_server_id: storm_server_id.map(StormServerId::new),
        })
        .await?;
    Ok(web::Json(response.into()))
}

/// Remove an account's storm user.
#[utoipa::path(
    delete,
    path = "/storm_users/{account_id}",
    params(("account_id" = i64, Path, description = "Account owning the storm user")),
    responses(
        (status = 200, description = "Storm user removed", body = DestroyStormUserResponseBody),
        (status = 400, description = "Admission refused or no storm user", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Storm server refused the removal", body = ErrorSchema)
    ),
    tags = ["storm-users"],
    operation_id = "destroyStormUser",
    security(("SessionCookie" = []))
)]
#[delete("/storm_users/{account_id}")]
pub async fn destroy_storm_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
) -> ApiResult<web::Json<DestroyStormUserResponseBody>> {
    let requester = session.require_account_id()?;
    let response = state
        .storm_users
        .destroy(DestroyStormUserRequest {
            requester,
            account_id: AccountId::new(path.into_inner()),
        })
        .await?;
    Ok(web::Json(response.into()))
}

/// Change one storm user's bandrate.
#[utoipa::path(
    patch,
    path = "/storm_users/{account_id}",
    params(("account_id" = i64, Path, description = "Account owning the storm user")),
    request_body = BandrateBody,
    responses(
        (status = 200, description = "Bandrate changed", body = StormUserResponseBody),
        (status = 400, description = "Admission refused or invalid bandrate", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Storm server refused the change", body = ErrorSchema)
    ),
    tags = ["storm-users"],
    operation_id = "updateStormUser",
    security(("SessionCookie" = []))
)]
#[patch("/storm_users/{account_id}")]
pub async fn update_storm_user(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
    payload: web::Json<BandrateBody>,
) -> ApiResult<web::Json<StormUserResponseBody>> {
    let requester = session.require_account_id()?;
    let response = state
        .storm_users
        .update(UpdateStormUserRequest {
            requester,
            account_id: AccountId::new(path.into_inner()),
            bandrate: payload.into_inner().bandrate,
        })
        .await?;
    Ok(web::Json(response.into()))
}

/// Change every storm user of an enterprise and its default bandrate.
#[utoipa::path(
    patch,
    path = "/enterprises/{enterprise_id}/storm_users/settings",
    params(("enterprise_id" = i64, Path, description = "Enterprise to update")),
    request_body = BandrateBody,
    responses(
        (status = 200, description = "Bandrates changed", body = BulkUpdateResponseBody),
        (status = 400, description = "Admission refused or invalid bandrate", body = ErrorSchema),
        (status = 401, description = "Unauthorized", body = ErrorSchema),
        (status = 500, description = "Storm server refused the change", body = ErrorSchema)
    ),
    tags = ["storm-users"],
    operation_id = "bulkUpdateStormUsers",
    security(("SessionCookie" = []))
)]
#[patch("/enterprises/{enterprise_id}/storm_users/settings")]
pub async fn bulk_update_storm_users(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<i64>,
    payload: web::Json<BandrateBody>,
) -> ApiResult<web::Json<BulkUpdateResponseBody>> {
    let requester = session.require_account_id()?;
    let response = state
        .storm_users
        .bulk_update(BulkUpdateStormUsersRequest {
            requester,
            enterprise_id: EnterpriseId::new(path.into_inner()),
            bandrate: payload.into_inner().bandrate,
        })
        .await?;
    Ok(web::Json(response.into()))
}

#[cfg(test)]
#[path = "storm_users_tests.rs"]
mod tests;
