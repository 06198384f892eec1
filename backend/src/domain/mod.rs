//! Domain primitives, the admission controller and the storm coordinators.
//!
//! Purpose: keep the storm tier's rules free of transport and persistence
//! concerns. Inbound adapters call the driving ports in [`ports`]; the
//! coordinators reach the registry, the remote provisioning service and the
//! filesystem through driven ports only.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - Account, Enterprise, StormSettings: read models consumed by admission.
//! - StormAccount, StormServer, Bandrate: storm registry entities.
//! - TransferJob and friends: the two-phase migration protocol.
//! - StormSyncService, StormMigrationService: the coordinators.

pub mod account;
pub mod admission;
pub mod error;
pub mod keyed_locks;
pub mod ports;
pub mod storm;
pub mod storm_migration_service;
pub mod storm_sync_service;
pub mod trace_id;
pub mod transfer;

pub use self::account::{Account, AccountId, Enterprise, EnterpriseId, Role, StormSettings};
pub use self::admission::AdmissionState;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::keyed_locks::KeyedLocks;
pub use self::storm::{
    Bandrate, BandrateError, NewStormAccount, RemoteUserId, StormAccount, StormAccountId,
    StormServer, StormServerId, StormUserName,
};
pub use self::storm_migration_service::StormMigrationService;
pub use self::storm_sync_service::StormSyncService;
pub use self::trace_id::TraceId;
pub use self::transfer::{
    EntryName, JobId, PrimaryPath, ResourceId, StagingPath, TransferDirection, TransferInputError,
    TransferJob, TransferJobKey, TransferOutcome, UnknownTransferAction,
};

/// HTTP header name used to propagate trace identifiers.
pub const TRACE_ID_HEADER: &str = "trace-id";
