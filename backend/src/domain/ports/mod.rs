//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports ([`StormAccountCommand`], [`StormTransferCommand`]) are
//! consumed by inbound adapters. Driven ports are implemented under
//! `outbound`.

mod macros;
pub(crate) use macros::define_port_error;

mod account_directory;
mod storm_account_command;
mod storm_provisioning_client;
mod storm_registry;
mod storm_transfer_command;
mod transfer_filesystem;
mod transfer_job_store;

#[cfg(test)]
pub use account_directory::MockAccountDirectory;
pub use account_directory::{AccountDirectory, AccountDirectoryError, FixtureAccountDirectory};
#[cfg(test)]
pub use storm_account_command::MockStormAccountCommand;
pub use storm_account_command::{
    BulkUpdateStormUsersRequest, BulkUpdateStormUsersResponse, CreateStormUserRequest,
    DestroyStormUserRequest, DestroyStormUserResponse, FixtureStormAccountCommand,
    StormAccountCommand, StormUserResponse, UpdateStormUserRequest,
};
#[cfg(test)]
pub use storm_provisioning_client::MockStormProvisioningClient;
pub use storm_provisioning_client::{
    BulkUpdateReply, CreateRemoteUser, CreateUserReply, FixtureStormProvisioningClient,
    RemoteMoveRequest, STATUS_CREATED, STATUS_NO_CONTENT, STATUS_OK, StormProvisioningClient,
    StormProvisioningError,
};
#[cfg(test)]
pub use storm_registry::MockStormRegistry;
pub use storm_registry::{StormRegistry, StormRegistryError};
#[cfg(test)]
pub use storm_transfer_command::MockStormTransferCommand;
pub use storm_transfer_command::{
    DownloadPathRequest, DownloadPathResponse, FixtureStormTransferCommand, MoveToPrimaryRequest,
    MoveToStormRequest, StormTransferCommand, TransferAccepted, TransferCompletion,
    TransferCompletionRequest,
};
#[cfg(test)]
pub use transfer_filesystem::MockTransferFilesystem;
pub use transfer_filesystem::{EntryKind, TransferFilesystem, TransferFilesystemError};
#[cfg(test)]
pub use transfer_job_store::MockTransferJobStore;
pub use transfer_job_store::{TransferJobStore, TransferJobStoreError};
