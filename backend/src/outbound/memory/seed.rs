//! JSON seed for database-less runs.
//!
//! ```json
//! {
//!   "enterprises": [{"id": 1, "storm_enabled": true, "default_bandrate": 10, "max_storm_accounts": 5}],
//!   "accounts": [{"id": 1, "enterprise_id": 1, "role": "owner"}],
//!   "servers": [{"id": 1, "endpoint": "http://storm-1:8080/", "staging_root": "/srv/storm-1"}]
//! }
//! ```

use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::domain::ports::FixtureAccountDirectory;
use crate::domain::{Account, Bandrate, Enterprise, EnterpriseId, StormServer, StormSettings};

use super::InMemoryStormRegistry;

/// Failure loading a seed file.
#[derive(Debug, Error)]
pub enum SeedLoadError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SeedEnterprise {
    id: EnterpriseId,
    #[serde(default)]
    storm_enabled: bool,
    #[serde(default)]
    default_bandrate: u64,
    #[serde(default)]
    max_storm_accounts: u32,
}

impl From<SeedEnterprise> for Enterprise {
    fn from(seed: SeedEnterprise) -> Self {
        Self {
            id: seed.id,
            settings: StormSettings {
                storm_enabled: seed.storm_enabled,
                default_bandrate: Bandrate::new(seed.default_bandrate),
            },
            max_storm_accounts: seed.max_storm_accounts,
            registered_storm_accounts: 0,
        }
    }
}

/// Enterprises, accounts and storm servers to preload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedData {
    #[serde(default)]
    enterprises: Vec<SeedEnterprise>,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    servers: Vec<StormServer>,
}

impl SeedData {
    /// Parse seed JSON.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Build the in-memory adapters holding this seed.
    pub fn into_adapters(self) -> (FixtureAccountDirectory, InMemoryStormRegistry) {
        let registry = InMemoryStormRegistry::new();
        for enterprise in self.enterprises {
            registry.insert_enterprise(enterprise.into());
        }
        for server in self.servers {
            registry.insert_server(server);
        }
        (FixtureAccountDirectory::new(self.accounts), registry)
    }
}

/// Read a seed file through a capability-scoped handle on its parent.
pub fn load_seed(path: &Path) -> Result<SeedData, SeedLoadError> {
    let read_error = |source| SeedLoadError::Read {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        read_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "seed path must name a file",
        ))
    })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
    let contents = dir.read_to_string(file_name).map_err(read_error)?;
    let seed = SeedData::from_json(&contents).map_err(|source| SeedLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        path = %path.display(),
        enterprises = seed.enterprises.len(),
        accounts = seed.accounts.len(),
        servers = seed.servers.len(),
        "storm seed loaded"
    );
    Ok(seed)
}
