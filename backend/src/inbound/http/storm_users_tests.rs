//! Tests for storm user HTTP handlers.

use super::*;
use crate::domain::ports::{FixtureStormTransferCommand, MockStormAccountCommand};
use crate::domain::{
    Bandrate, Error, RemoteUserId, StormAccount, StormAccountId, StormUserName,
};
use crate::inbound::http::test_utils::{login_as, login_route, test_session_middleware};
use actix_web::http::StatusCode;
use actix_web::{App, test as actix_test, web};
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;

const OWNER: i64 = 1;
const MEMBER: i64 = 2;

fn test_app(
    command: MockStormAccountCommand,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let state = HttpState::new(Arc::new(command), Arc::new(FixtureStormTransferCommand));
    App::new()
        .app_data(web::Data::new(state))
        .wrap(test_session_middleware())
        .configure(login_route)
        .service(create_storm_user)
        .service(destroy_storm_user)
        .service(update_storm_user)
        .service(bulk_update_storm_users)
}

fn storm_user(account_id: i64, bandrate: u64) -> StormUserResponse {
    let account = AccountId::new(account_id);
    StormUserResponse {
        account_id: account,
        storm_user: StormAccount {
            id: StormAccountId::new(7),
            account_id: account,
            enterprise_id: EnterpriseId::new(10),
            storm_server_id: StormServerId::new(3),
            remote_user_id: RemoteUserId::new("remote-7"),
            name: StormUserName::for_account(account),
            bandrate: Bandrate::new(bandrate),
        },
    }
}

#[actix_web::test]
async fn create_forwards_the_raw_bandrate_and_requester() {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_create()
        .withf(|request| {
            request.requester == AccountId::new(OWNER)
                && request.account_id == AccountId::new(MEMBER)
                && request.bandrate == json!("1000")
                && request.storm_server_id == Some(StormServerId::new(3))
        })
        .times(1)
        .return_once(|_| Err(Error::invalid_bandrate("bandrate must be an integer")));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/storm_users/{MEMBER}"))
            .cookie(cookie)
            .set_json(json!({"bandrate": "1000", "storm_server_id": 3}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "invalid_bandrate");
}

#[actix_web::test]
async fn create_returns_the_recorded_storm_user() {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_create()
        .withf(|request| request.bandrate.is_null() && request.storm_server_id.is_none())
        .times(1)
        .return_once(|_| Ok(storm_user(MEMBER, 500)));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::post()
            .uri(&format!("/storm_users/{MEMBER}"))
            .cookie(cookie)
            .set_json(json!({}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["account_id"], MEMBER);
    assert_eq!(body["storm_user"]["name"], "acct-2");
    assert_eq!(body["storm_user"]["bandrate"], 500);
    assert_eq!(body["storm_user"]["remote_user_id"], "remote-7");
}

#[rstest]
#[case::create(actix_test::TestRequest::post().uri("/storm_users/2").set_json(json!({"bandrate": 1})))]
#[case::destroy(actix_test::TestRequest::delete().uri("/storm_users/2"))]
#[case::update(actix_test::TestRequest::patch().uri("/storm_users/2").set_json(json!({"bandrate": 1})))]
#[case::bulk(actix_test::TestRequest::patch().uri("/enterprises/10/storm_users/settings").set_json(json!({"bandrate": 1})))]
#[actix_web::test]
async fn requests_without_a_session_are_unauthorised(#[case] request: actix_test::TestRequest) {
    let app = actix_test::init_service(test_app(MockStormAccountCommand::new())).await;

    let response = actix_test::call_service(&app, request.to_request()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], "unauthorized");
}

#[rstest]
#[case(Error::storm_user_count_reached("quota reached"), StatusCode::BAD_REQUEST, "storm_user_count_reached")]
#[case(Error::unpermitted_account("not an owner"), StatusCode::BAD_REQUEST, "unpermitted_account")]
#[case(Error::storm_user_not_found("no storm user"), StatusCode::BAD_REQUEST, "storm_user_not_found")]
#[case(Error::destroy_storm_user_error("refused"), StatusCode::INTERNAL_SERVER_ERROR, "destroy_storm_user_error")]
#[actix_web::test]
async fn destroy_failures_map_to_status_codes(
    #[case] failure: Error,
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_destroy()
        .times(1)
        .return_once(move |_| Err(failure));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/storm_users/{MEMBER}"))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), status);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body["code"], code);
}

#[actix_web::test]
async fn destroy_returns_the_remote_status() {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_destroy()
        .withf(|request| request.account_id == AccountId::new(MEMBER))
        .times(1)
        .return_once(|_| Ok(DestroyStormUserResponse { status: 204 }));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::delete()
            .uri(&format!("/storm_users/{MEMBER}"))
            .cookie(cookie)
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body, json!({"status": 204}));
}

#[actix_web::test]
async fn update_passes_a_missing_bandrate_as_null() {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_update()
        .withf(|request| request.bandrate.is_null())
        .times(1)
        .return_once(|_| Err(Error::invalid_bandrate("bandrate is required")));
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri(&format!("/storm_users/{MEMBER}"))
            .cookie(cookie)
            .set_json(json!({}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn bulk_update_reports_the_new_default() {
    let mut command = MockStormAccountCommand::new();
    command
        .expect_bulk_update()
        .withf(|request| {
            request.enterprise_id == EnterpriseId::new(10)
                && request.requester == AccountId::new(OWNER)
                && request.bandrate == json!(3000)
        })
        .times(1)
        .return_once(|_| {
            Ok(BulkUpdateStormUsersResponse {
                enterprise_id: EnterpriseId::new(10),
                default_bandrate: Bandrate::new(3000),
                updated: 2,
            })
        });
    let app = actix_test::init_service(test_app(command)).await;
    let cookie = login_as(&app, OWNER).await;

    let response = actix_test::call_service(
        &app,
        actix_test::TestRequest::patch()
            .uri("/enterprises/10/storm_users/settings")
            .cookie(cookie)
            .set_json(json!({"bandrate": 3000}))
            .to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(
        body,
        json!({"enterprise_id": 10, "default_bandrate": 3000, "updated": 2})
    );
}
