//! Driven port for the file placements a transfer completion performs.
//!
//! Primary-tier paths are resolved against the primary root the adapter was
//! built with; staging paths against the storm server's staging root.
//! Moves are renames and never overwrite an existing entry.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{EntryName, PrimaryPath, StagingPath};

use super::define_port_error;

/// Kind of entry found at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Missing,
}

define_port_error! {
    /// Errors raised by transfer filesystem adapters.
    pub enum TransferFilesystemError {
        /// The entry to move does not exist.
        SourceNotFound { path: String } => "transfer source {path} not found",
        /// The folder receiving the entry does not exist or is not a folder.
        DestinationNotFound { path: String } => "transfer destination {path} not found",
        /// An entry with the target name already exists.
        DestinationExists { path: String } => "transfer destination {path} already exists",
        /// Any other I/O failure.
        Io { message: String } => "transfer filesystem error: {message}",
    }
}

/// File placement operations used by the migration coordinator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferFilesystem: Send + Sync {
    /// Kind of the primary-tier entry at `path`.
    async fn entry_kind(&self, path: &PrimaryPath) -> Result<EntryKind, TransferFilesystemError>;

    /// Move `staging_root/staged` into the primary `folder` under `name`.
    async fn move_staged_into_primary(
        &self,
        staging_root: &Path,
        staged: &StagingPath,
        folder: &PrimaryPath,
        name: &EntryName,
    ) -> Result<(), TransferFilesystemError>;

    /// Move the primary `file` into `staging_root/folder` under `name`.
    async fn move_primary_into_staging(
        &self,
        file: &PrimaryPath,
        staging_root: &Path,
        folder: &StagingPath,
        name: &EntryName,
    ) -> Result<(), TransferFilesystemError>;
}
