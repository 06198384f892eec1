//! HTTP server configuration object and helpers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::cookie::{Key, SameSite};
use storm_backend::domain::ports::FixtureAccountDirectory;
use storm_backend::outbound::memory::InMemoryStormRegistry;
use storm_backend::outbound::persistence::DbPool;

/// Where the registry and account directory live.
pub enum RegistryBackend {
    /// PostgreSQL via Diesel.
    Database(DbPool),
    /// Process-local adapters, optionally seeded from JSON.
    Memory {
        accounts: FixtureAccountDirectory,
        registry: InMemoryStormRegistry,
    },
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) key: Key,
    pub(crate) cookie_secure: bool,
    pub(crate) same_site: SameSite,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) primary_root: PathBuf,
    pub(crate) remote_timeout: Duration,
    pub(crate) backend: RegistryBackend,
}

impl ServerConfig {
    /// Construct a configuration backed by an empty in-memory registry.
    #[must_use]
    pub fn new(key: Key, cookie_secure: bool, same_site: SameSite, bind_addr: SocketAddr) -> Self {
        Self {
            key,
            cookie_secure,
            same_site,
            bind_addr,
            primary_root: PathBuf::from("."),
            remote_timeout: Duration::from_secs(30),
            backend: RegistryBackend::Memory {
                accounts: FixtureAccountDirectory::default(),
                registry: InMemoryStormRegistry::new(),
            },
        }
    }

    /// Use the Diesel adapters over `pool`.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.backend = RegistryBackend::Database(pool);
        self
    }

    /// Use seeded in-memory adapters.
    #[must_use]
    pub fn with_memory_registry(
        mut self,
        accounts: FixtureAccountDirectory,
        registry: InMemoryStormRegistry,
    ) -> Self {
        self.backend = RegistryBackend::Memory { accounts, registry };
        self
    }

    /// Set the root directory of the primary tier.
    #[must_use]
    pub fn with_primary_root(mut self, primary_root: PathBuf) -> Self {
        self.primary_root = primary_root;
        self
    }

    /// Set the timeout for storm server calls.
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}
