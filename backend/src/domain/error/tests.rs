//! Tests for domain error construction and serialisation.

use super::*;
use crate::domain::TraceId;
use rstest::{fixture, rstest};
use serde_json::json;

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[fixture]
fn expected_trace_id() -> String {
    TRACE_ID.to_owned()
}

#[rstest]
fn account_not_found_constructor_sets_code() {
    let err = Error::account_not_found("missing");
    assert_eq!(err.code(), ErrorCode::AccountNotFound);
    assert_eq!(err.message(), "missing");
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn try_with_trace_id_rejects_empty_values() {
    let result = Error::invalid_request("bad").try_with_trace_id("   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyTraceId)));
}

#[rstest]
fn new_returns_none_when_trace_id_out_of_scope() {
    let error = Error::internal("boom");
    assert!(error.trace_id().is_none());
}

#[rstest]
#[tokio::test]
async fn new_captures_trace_id_in_scope(expected_trace_id: String) {
    let trace_id: TraceId = expected_trace_id
        .parse()
        .expect("fixtures provide a valid UUID");
    let error = TraceId::scope(trace_id, async move {
        Error::storm_user_count_reached("quota exhausted")
    })
    .await;

    assert_eq!(error.trace_id(), Some(expected_trace_id.as_str()));
}

#[rstest]
#[case(ErrorCode::StormUserCountReached, "storm_user_count_reached")]
#[case(ErrorCode::BulkUpdateStormUsersError, "bulk_update_storm_users_error")]
#[case(ErrorCode::UnpermittedEnterprise, "unpermitted_enterprise")]
#[case(ErrorCode::InvalidBandrate, "invalid_bandrate")]
fn codes_serialise_as_snake_case(#[case] code: ErrorCode, #[case] expected: &str) {
    let value = serde_json::to_value(code).expect("code serialises");
    assert_eq!(value, json!(expected));
}

#[rstest]
fn serialised_payload_omits_absent_fields() {
    let value = serde_json::to_value(Error::already_exists("dup")).expect("error serialises");
    assert_eq!(value, json!({"code": "already_exists", "message": "dup"}));
}

#[rstest]
fn deserialisation_rejects_blank_message() {
    let result = serde_json::from_value::<Error>(json!({"code": "user_not_found", "message": " "}));
    assert!(result.is_err());
}

#[rstest]
fn remote_codes_are_flagged() {
    assert!(ErrorCode::DestroyStormUserError.is_remote());
    assert!(ErrorCode::MoveToStormError.is_remote());
    assert!(!ErrorCode::AlreadyExists.is_remote());
}
