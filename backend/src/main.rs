//! Backend entry-point: loads settings, prepares the registry and serves the
//! storm REST endpoints.

mod server;

use actix_web::cookie::SameSite;
use actix_web::web;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use server::{ServerConfig, create_server};
use storm_backend::inbound::http::health::HealthState;
use storm_backend::outbound::memory::{SeedData, load_seed};
use storm_backend::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use storm_backend::settings::{ServiceSettings, key_fingerprint};

async fn attach_registry(config: ServerConfig, settings: &ServiceSettings) -> Result<ServerConfig> {
    if let Some(url) = settings.database_url.clone() {
        let migrate_url = url.clone();
        tokio::task::spawn_blocking(move || run_pending_migrations(&migrate_url))
            .await
            .wrap_err("migration task failed")?
            .wrap_err("failed to migrate the storm registry")?;
        let pool = DbPool::new(PoolConfig::new(url))
            .await
            .wrap_err("failed to build the database pool")?;
        return Ok(config.with_db_pool(pool));
    }

    let seed = match &settings.seed_file {
        Some(path) => load_seed(path)
            .wrap_err_with(|| format!("failed to load seed file {}", path.display()))?,
        None => {
            warn!("no database or seed configured; starting with an empty registry");
            SeedData::default()
        }
    };
    let (accounts, registry) = seed.into_adapters();
    Ok(config.with_memory_registry(accounts, registry))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServiceSettings::load_from_iter(std::env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;
    let key = settings.session_key()?;
    info!(fingerprint = %key_fingerprint(&key), "session key loaded");

    let config = ServerConfig::new(
        key,
        settings.cookie_secure(),
        SameSite::Lax,
        settings.bind_addr(),
    )
    .with_primary_root(settings.primary_root())
    .with_remote_timeout(settings.remote_timeout());
    let config = attach_registry(config, &settings).await?;

    let health_state = web::Data::new(HealthState::new());
    info!(bind_addr = %settings.bind_addr(), "starting storm backend");
    let server = create_server(health_state, config)?;
    server.await?;
    Ok(())
}
