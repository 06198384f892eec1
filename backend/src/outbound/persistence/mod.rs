//! PostgreSQL persistence for the storm registry and the account directory.
//!
//! Adapters translate between Diesel rows (`models.rs`, `schema.rs`, both
//! private) and domain types. Connections come from a `bb8` pool of
//! `diesel-async` connections; database failures surface as the owning
//! port's error enum.

mod diesel_account_directory;
mod diesel_storm_registry;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_account_directory::DieselAccountDirectory;
pub use diesel_storm_registry::DieselStormRegistry;
pub use migrations::{MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
