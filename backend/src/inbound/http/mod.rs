//! HTTP inbound adapter exposing the storm REST endpoints.

pub mod error;
pub mod health;
pub mod schemas;
pub mod session;
pub mod state;
pub mod storm_transfers;
pub mod storm_users;
#[cfg(test)]
pub mod test_utils;

pub use error::ApiResult;

use actix_web::web;

/// Register the storm endpoints.
///
/// Session middleware must wrap every route except `move_finished`, which
/// ignores the cookie.
pub fn configure_storm_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(storm_users::create_storm_user)
        .service(storm_users::destroy_storm_user)
        .service(storm_users::update_storm_user)
        .service(storm_users::bulk_update_storm_users)
        .service(storm_transfers::download_path)
        .service(storm_transfers::move_to_storm)
        .service(storm_transfers::move_to_primary)
        .service(storm_transfers::move_finished);
}
