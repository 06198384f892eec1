//! Tests for storm migration HTTP handlers.

use super::*;
use crate::domain::ports::{FixtureStormAccountCommand, MockStormTransferCommand};
use crate::domain::{AccountId, Error, JobId, TransferDirection};
use crate::inbound::http::test_utils::{login_as, login_route, test_session_middleware};
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;

const REQUESTER: i64 = 42;
const JID: &str = "cmVwb3J0cy9xMy5wZGY";

fn test_app(
    command: MockStormTransferCommand,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let state = HttpState::new(Arc::new(FixtureStormAccountCommand), Arc::new(command));
    App::new()
        .app_data(web::Data::new(state))
        .wrap(test_session_middleware())
        .configure(login_route)
        .service(download_path)
        .service(move_to_storm)
        .service(move_to_primary)
        .service(move_finished)
}

fn job_id() -> JobId {
    JobId::parse(JID).expect("fixture job id")
}

#[actix_web::test]
async fn download_path_forwards_id_and_user() {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_download_path()
        .withf(|request| {
            request.requester == AccountId::new(REQUESTER)
                && request.id == JID
                && request.user == "acct-42"
        })
        .times(1)
        .return_once(|_| {
            Ok(DownloadPathResponse {
                path: "/reports/q3.pdf".into(),
                name: "q3.pdf".into(),
            })
        });
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, REQUESTER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(&format!("/storm/download_path/{JID}?user=acct-42"))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body, json!({"path": "/reports/q3.pdf", "name": "q3.pdf"}));
}

#[actix_web::test]
async fn download_path_without_user_sends_a_blank_name() {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_download_path()
        .withf(|request| request.user.is_empty())
        .times(1)
        .return_once(|_| Err(Error::user_not_found("unknown storm user")));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, REQUESTER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::get()
            .uri(&format!("/storm/download_path/{JID}"))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "user_not_found");
}

#[actix_web::test]
async fn move_to_storm_reports_the_pending_job() {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_move_to_storm()
        .withf(|request| {
            request.jid == JID && request.name == "q3.pdf" && request.user == "acct-42"
        })
        .times(1)
        .return_once(|_| {
            Ok(TransferAccepted {
                jid: job_id(),
                direction: TransferDirection::ToStorm,
            })
        });
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, REQUESTER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/storm/move_to_storm")
            .cookie(cookie)
            .set_json(json!({"jid": JID, "name": "q3.pdf", "user": "acct-42"}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body, json!({"jid": JID, "act": "move_to_storm"}));
}

#[actix_web::test]
async fn refused_move_to_storm_is_a_server_error() {
    let mut command = MockStormTransferCommand::new();
    command.expect_move_to_storm().times(1).return_once(|_| {
        Err(Error::move_to_storm_error("storm server refused the transfer")
            .with_details(json!({"status": 500})))
    });
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, REQUESTER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/storm/move_to_storm")
            .cookie(cookie)
            .set_json(json!({"jid": JID, "name": "q3.pdf", "user": "acct-42"}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "move_to_storm_error");
    assert_eq!(body["details"], json!({"status": 500}));
}

#[actix_web::test]
async fn move_to_primary_forwards_the_staging_path() {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_move_to_primary()
        .withf(|request| request.path == "out/r.pdf" && request.name == "report.pdf")
        .times(1)
        .return_once(|_| {
            Ok(TransferAccepted {
                jid: job_id(),
                direction: TransferDirection::ToPrimary,
            })
        });
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, REQUESTER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/storm/move_to_primary")
            .cookie(cookie)
            .set_json(json!({
                "jid": JID,
                "name": "report.pdf",
                "path": "out/r.pdf",
                "user": "acct-42"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["act"], "move_to_primary");
}

#[rstest]
#[case::download(actix_test::TestRequest::get().uri("/storm/download_path/abc?user=acct-1"))]
#[case::to_storm(actix_test::TestRequest::post().uri("/storm/move_to_storm").set_json(json!({})))]
#[case::to_primary(actix_test::TestRequest::post().uri("/storm/move_to_primary").set_json(json!({})))]
#[actix_web::test]
async fn initiations_require_a_session(#[case] request: actix_test::TestRequest) {
    let app = actix_test::init_service(test_app(MockStormTransferCommand::new())).await;

    let response = actix_test::call_service(&app, request.to_request()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn move_finished_needs_no_session() {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_complete()
        .withf(|request| {
            request.act == "move_to_primary" && request.jid == JID && request.error.is_empty()
        })
        .times(1)
        .return_once(|_| {
            Ok(TransferCompletion {
                jid: job_id(),
                direction: TransferDirection::ToPrimary,
                outcome: TransferOutcome::Completed,
            })
        });
    let app = actix_test::init_service(test_app(command)).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/storm/move_finished")
            .set_json(json!({
                "act": "move_to_primary",
                "jid": JID,
                "name": "report.pdf",
                "path": "out/r.pdf",
                "user": "acct-42"
            }))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(
        body,
        json!({"jid": JID, "act": "move_to_primary", "outcome": "completed"})
    );
}

#[rstest]
#[case(Error::invalid_action("unknown transfer action `foobar`"), "invalid_action")]
#[case(Error::user_not_found("unknown storm user"), "user_not_found")]
#[case(Error::job_not_found("no pending job"), "job_not_found")]
#[case(Error::storm_server_error("remote transfer failed"), "storm_server_error")]
#[actix_web::test]
async fn rejected_callbacks_are_client_errors(#[case] failure: Error, #[case] code: &str) {
    let mut command = MockStormTransferCommand::new();
    command
        .expect_complete()
        .times(1)
        .return_once(move |_| Err(failure));
    let app = actix_test::init_service(test_app(command)).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri("/storm/move_finished")
            .set_json(json!({"act": "foobar", "jid": JID}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], code);
}
