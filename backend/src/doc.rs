//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers every storm endpoint, the health checks, the error
//! schemas from [`crate::inbound::http::schemas`] and the session cookie
//! security scheme. The document backs Swagger UI in debug builds and is
//! exported via `cargo run --bin openapi-dump`.

use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::storm_transfers::{
    DownloadPathBody, MoveFinishedBody, MoveToPrimaryBody, MoveToStormBody,
    TransferAcceptedBody, TransferCompletionBody,
};
use crate::inbound::http::storm_users::{
    BandrateBody, BulkUpdateResponseBody, CreateStormUserBody, DestroyStormUserResponseBody,
    StormUserBody, StormUserResponseBody,
};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the session cookie security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "SessionCookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "session",
                "Session cookie issued by the login service.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Storm backend API",
        description = "Storm user provisioning and storm tier file migration."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("SessionCookie" = [])),
    paths(
        crate::inbound::http::storm_users::create_storm_user,
        crate::inbound::http::storm_users::destroy_storm_user,
        crate::inbound::http::storm_users::update_storm_user,
        crate::inbound::http::storm_users::bulk_update_storm_users,
        crate::inbound::http::storm_transfers::download_path,
        crate::inbound::http::storm_transfers::move_to_storm,
        crate::inbound::http::storm_transfers::move_to_primary,
        crate::inbound::http::storm_transfers::move_finished,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        ErrorSchema,
        ErrorCodeSchema,
        CreateStormUserBody,
        BandrateBody,
        StormUserBody,
        StormUserResponseBody,
        DestroyStormUserResponseBody,
        BulkUpdateResponseBody,
        DownloadPathBody,
        MoveToStormBody,
        MoveToPrimaryBody,
        TransferAcceptedBody,
        MoveFinishedBody,
        TransferCompletionBody,
    )),
    tags(
        (name = "storm-users", description = "Storm user lifecycle"),
        (name = "storm-transfers", description = "Moves between the primary and storm tiers"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
