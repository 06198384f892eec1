//! In-memory adapters for development runs and tests.

mod seed;
mod storm_registry;
mod transfer_job_store;

pub use seed::{SeedData, SeedLoadError, load_seed};
pub use storm_registry::InMemoryStormRegistry;
pub use transfer_job_store::InMemoryTransferJobStore;
