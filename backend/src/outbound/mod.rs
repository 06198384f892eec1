//! Outbound adapters implementing the driven ports.
//!
//! - **persistence**: PostgreSQL registry and account directory (Diesel)
//! - **memory**: in-memory registry, job store and JSON seed loading
//! - **provisioning**: reqwest client for the remote storm servers
//! - **filesystem**: capability-scoped file moves for transfer completions
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business rules.

pub mod filesystem;
pub mod memory;
pub mod persistence;
pub mod provisioning;
