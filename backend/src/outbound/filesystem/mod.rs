//! Filesystem adapters for transfer completions.

mod cap_std_transfer_filesystem;

pub use cap_std_transfer_filesystem::CapStdTransferFilesystem;
