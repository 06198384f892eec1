//! Embedded PostgreSQL databases for registry integration tests.
//!
//! One cluster is shared per test binary. Each test gets a database cloned
//! from a template that already carries the crate's migrations; the template
//! name includes a hash of `migrations/` so schema edits produce a fresh one.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use pg_embedded_setup_unpriv::test_support::hash_directory;
use pg_embedded_setup_unpriv::{ClusterHandle, TemporaryDatabase};
use storm_backend::outbound::persistence::run_pending_migrations;
use uuid::Uuid;

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TEMPLATE_NAME_PREFIX: &str = "storm_template";
const PROVISION_RETRIES: usize = 5;
const PROVISION_RETRY_DELAY: Duration = Duration::from_millis(500);
// A fixed password keeps a reused data directory reachable across runs.
const CLUSTER_PASSWORD: &str = "storm_embedded_test";

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

fn template_database_name() -> Result<String, String> {
    let hash = hash_directory(migrations_dir()).map_err(|err| format!("hash migrations: {err}"))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

/// The cluster shared by every test in this binary.
pub fn shared_cluster() -> Result<&'static ClusterHandle, String> {
    let _password = std::env::var_os("PG_PASSWORD")
        .is_none()
        .then(|| env_lock::lock_env([("PG_PASSWORD", Some(CLUSTER_PASSWORD))]));
    let mut last_error = String::new();
    for attempt in 1..=PROVISION_RETRIES {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(err) => last_error = format!("attempt {attempt}/{PROVISION_RETRIES}: {err:?}"),
        }
        std::thread::sleep(PROVISION_RETRY_DELAY);
    }
    Err(last_error)
}

/// Create the migrated template unless it already exists.
fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, String> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| format!("template check: {err:?}"))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| format!("create template: {err:?}"))?;
        let url = cluster.connection().database_url(&template_name);
        run_pending_migrations(&url).map_err(|err| err.to_string())?;
    }
    Ok(template_name)
}

/// A fresh database cloned from the migrated template.
pub fn provision_template_database(cluster: &ClusterHandle) -> Result<TemporaryDatabase, String> {
    let mut last_error = String::new();
    for attempt in 1..=PROVISION_RETRIES {
        let outcome = ensure_template_database(cluster).and_then(|template| {
            let name = format!("test_{}", Uuid::new_v4().simple());
            cluster
                .temporary_database_from_template(name.as_str(), template.as_str())
                .map_err(|err| format!("clone template: {err:?}"))
        });
        match outcome {
            Ok(database) => return Ok(database),
            Err(err) => last_error = format!("attempt {attempt}/{PROVISION_RETRIES}: {err}"),
        }
        std::thread::sleep(PROVISION_RETRY_DELAY);
    }
    Err(last_error)
}
