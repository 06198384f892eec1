//! OpenAPI schema definitions for domain types.
//!
//! Domain types remain framework-agnostic by not deriving `ToSchema`. This
//! module provides the schema definitions required for OpenAPI documentation
//! using utoipa's external schema registration.

use utoipa::ToSchema;

/// OpenAPI schema for [`crate::domain::ErrorCode`].
///
/// Stable machine-readable error codes returned in API error responses.
#[derive(ToSchema)]
#[schema(as = crate::domain::ErrorCode)]
pub enum ErrorCodeSchema {
    /// The request is malformed or fails validation.
    #[schema(rename = "invalid_request")]
    InvalidRequest,
    /// No authenticated session.
    #[schema(rename = "unauthorized")]
    Unauthorized,
    /// The target account does not exist.
    #[schema(rename = "account_not_found")]
    AccountNotFound,
    /// The requester may not manage this account.
    #[schema(rename = "unpermitted_account")]
    UnpermittedAccount,
    /// The enterprise does not have the storm tier enabled.
    #[schema(rename = "unpermitted_enterprise")]
    UnpermittedEnterprise,
    /// The enterprise storm quota is exhausted.
    #[schema(rename = "storm_user_count_reached")]
    StormUserCountReached,
    /// A storm user or pending transfer already exists.
    #[schema(rename = "already_exists")]
    AlreadyExists,
    /// The bandrate is not a non-negative integer.
    #[schema(rename = "invalid_bandrate")]
    InvalidBandrate,
    /// The account has no storm user.
    #[schema(rename = "storm_user_not_found")]
    StormUserNotFound,
    /// The storm server refused to create the user.
    #[schema(rename = "create_storm_user_error")]
    CreateStormUserError,
    /// The storm server refused to remove the user.
    #[schema(rename = "destroy_storm_user_error")]
    DestroyStormUserError,
    /// The storm server refused the bandrate change.
    #[schema(rename = "update_storm_user_error")]
    UpdateStormUserError,
    /// The storm server refused the enterprise-wide change.
    #[schema(rename = "bulk_update_storm_users_error")]
    BulkUpdateStormUsersError,
    /// The storm server refused the transfer request.
    #[schema(rename = "move_to_storm_error")]
    MoveToStormError,
    /// The storm user name does not resolve.
    #[schema(rename = "user_not_found")]
    UserNotFound,
    /// The job or resource id is blank or malformed.
    #[schema(rename = "invalid_jid")]
    InvalidJid,
    /// The entry name is blank or contains a separator.
    #[schema(rename = "invalid_name")]
    InvalidName,
    /// The staging path is blank or escapes the staging root.
    #[schema(rename = "invalid_path")]
    InvalidPath,
    /// The callback action is unknown or does not match the job.
    #[schema(rename = "invalid_action")]
    InvalidAction,
    /// No pending transfer job has this id.
    #[schema(rename = "job_not_found")]
    JobNotFound,
    /// The file to move does not exist.
    #[schema(rename = "transfer_source_not_found")]
    TransferSourceNotFound,
    /// The destination folder does not exist.
    #[schema(rename = "transfer_destination_not_found")]
    TransferDestinationNotFound,
    /// The storm server reported a transfer failure.
    #[schema(rename = "storm_server_error")]
    StormServerError,
    /// A dependency such as the registry is unavailable.
    #[schema(rename = "service_unavailable")]
    ServiceUnavailable,
    /// An unexpected error occurred on the server.
    #[schema(rename = "internal_error")]
    InternalError,
}

/// OpenAPI schema for [`crate::domain::Error`].
///
/// API error response payload with machine-readable code and human-readable
/// message.
#[derive(ToSchema)]
#[schema(as = crate::domain::Error)]
#[expect(
    dead_code,
    reason = "Used only for OpenAPI schema generation via utoipa"
)]
pub struct ErrorSchema {
    /// Stable machine-readable error code.
    #[schema(example = "storm_user_count_reached")]
    code: ErrorCodeSchema,
    /// Human-readable message returned to clients.
    #[schema(example = "enterprise storm quota reached")]
    message: String,
    /// Correlation identifier for tracing this error across systems.
    #[schema(example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
    trace_id: Option<String>,
    /// Supplementary error details, such as the remote status code.
    details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::PartialSchema;

    fn schema_to_json<T: PartialSchema>() -> String {
        serde_json::to_string(&T::schema()).expect("schema serialises to JSON")
    }

    #[test]
    fn error_schema_has_expected_name() {
        let schema_json = schema_to_json::<ErrorSchema>();
        // utoipa replaces :: with . in schema names
        assert_eq!(ErrorSchema::name(), "crate.domain.Error");
        assert!(
            schema_json.contains("trace_id"),
            "schema should contain trace_id field"
        );
        assert!(
            schema_json.contains("details"),
            "schema should contain details field"
        );
    }

    #[test]
    fn error_code_schema_variants_match_domain() {
        let schema_json = schema_to_json::<ErrorCodeSchema>();
        for code in [
        "invalid_request",
        "unauthorized",
        "account_not_found",
        "unpermitted_account",
        "unpermitted_enterprise",
        "storm_user_count_reached",
        "already_exists",
        "invalid_bandrate",
        "storm_user_not_found",
        "create_storm_user_error",
        "destroy_storm_user_error",
        "update_storm_user_error",
        "bulk_update_storm_users_error",
        "move_to_storm_error",
        "user_not_found",
        "invalid_jid",
        "invalid_name",
        "invalid_path",
        "invalid_action",
        "job_not_found",
        "transfer_source_not_found",
        "transfer_destination_not_found",
        "storm_server_error",
        "service_unavailable",
        "internal_error",
        ] {
            assert!(schema_json.contains(code), "missing {code}");
            let wire = serde_json::to_value(
                serde_json::from_value::<crate::domain::ErrorCode>(serde_json::json!(code))
                    .expect("domain knows the code"),
            )
            .expect("code serialises");
            assert_eq!(wire, serde_json::json!(code));
        }
    }
}
