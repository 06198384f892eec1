//! Builders wiring adapters into the coordinators behind [`HttpState`].

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use storm_backend::domain::ports::{AccountDirectory, StormRegistry};
use storm_backend::domain::{KeyedLocks, StormMigrationService, StormSyncService};
use storm_backend::inbound::http::state::HttpState;
use storm_backend::outbound::filesystem::CapStdTransferFilesystem;
use storm_backend::outbound::memory::InMemoryTransferJobStore;
use storm_backend::outbound::persistence::{DieselAccountDirectory, DieselStormRegistry};
use storm_backend::outbound::provisioning::HttpStormProvisioningClient;
use tracing::info;

use super::config::RegistryBackend;

/// Adapters shared by both coordinators regardless of the registry backend.
struct SharedAdapters {
    client: Arc<HttpStormProvisioningClient>,
    filesystem: Arc<CapStdTransferFilesystem>,
}

fn build_coordinators<D, R>(
    accounts: Arc<D>,
    registry: Arc<R>,
    shared: SharedAdapters,
) -> HttpState
where
    D: AccountDirectory + 'static,
    R: StormRegistry + 'static,
{
    let SharedAdapters { client, filesystem } = shared;
    let account_locks = Arc::new(KeyedLocks::default());
    let sync = StormSyncService::new(accounts, Arc::clone(&registry), Arc::clone(&client))
        .with_account_locks(Arc::clone(&account_locks));
    let migration = StormMigrationService::new(
        registry,
        Arc::new(InMemoryTransferJobStore::new()),
        filesystem,
        client,
    )
    .with_account_locks(account_locks);
    HttpState::new(Arc::new(sync), Arc::new(migration))
}

/// Build the HTTP state over `backend`.
///
/// # Errors
///
/// Fails when the primary root cannot be opened or the HTTP client cannot
/// be built.
pub(crate) fn build_http_state(
    backend: RegistryBackend,
    primary_root: &Path,
    remote_timeout: Duration,
) -> io::Result<HttpState> {
    let filesystem = CapStdTransferFilesystem::open(primary_root).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!(
                "failed to open primary root {}: {err}",
                primary_root.display()
            ),
        )
    })?;
    let client = HttpStormProvisioningClient::new(remote_timeout)
        .map_err(|err| io::Error::other(format!("failed to build storm client: {err}")))?;
    let shared = SharedAdapters {
        client: Arc::new(client),
        filesystem: Arc::new(filesystem),
    };

    let state = match backend {
        RegistryBackend::Database(pool) => {
            info!("using PostgreSQL storm registry");
            build_coordinators(
                Arc::new(DieselAccountDirectory::new(pool.clone())),
                Arc::new(DieselStormRegistry::new(pool)),
                shared,
            )
        }
        RegistryBackend::Memory { accounts, registry } => {
            info!("using in-memory storm registry");
            build_coordinators(Arc::new(accounts), Arc::new(registry), shared)
        }
    };
    Ok(state)
}
