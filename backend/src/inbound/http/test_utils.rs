//! Test helpers for inbound HTTP components.

use actix_session::{Session, SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{HttpResponse, test, web};

use super::session::ACCOUNT_ID_KEY;

/// Build a session middleware configured for tests.
///
/// - Generates a fresh signing/encryption key per invocation.
/// - Sets the cookie name to `session` and disables the `Secure` flag for
///   local HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// Route standing in for the external login service: stores the path's
/// account id in the session.
pub fn login_route(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/test/login/{account_id}",
        web::post().to(|session: Session, path: web::Path<i64>| async move {
            session
                .insert(ACCOUNT_ID_KEY, path.into_inner())
                .expect("session insert");
            HttpResponse::Ok().finish()
        }),
    );
}

/// Log in as `account_id` and return the session cookie.
pub async fn login_as<S>(app: &S, account_id: i64) -> Cookie<'static>
where
    S: Service<actix_http::Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let res = test::call_service(
        app,
        test::TestRequest::post()
            .uri(&format!("/test/login/{account_id}"))
            .to_request(),
    )
    .await;
    assert!(res.status().is_success(), "login route failed");
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .expect("session cookie set")
        .into_owned()
}
