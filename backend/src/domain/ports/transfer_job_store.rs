//! Port tracking pending transfer jobs between initiation and completion.

use async_trait::async_trait;

use crate::domain::{JobId, TransferJob, TransferJobKey};

use super::define_port_error;

define_port_error! {
    /// Errors raised by transfer job stores.
    pub enum TransferJobStoreError {
        /// A job with the same key is already pending.
        Duplicate { job_id: String } => "transfer job {job_id} is already pending",
        /// The backing store failed.
        Backend { message: String } => "transfer job store failed: {message}",
    }
}

/// Pending job bookkeeping, keyed by [`TransferJob::key`].
///
/// [`TransferJobStore::take`] removes the job, so a job can be resolved at
/// most once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferJobStore: Send + Sync {
    /// Record a job unless one with the same key is pending.
    async fn insert(&self, job: TransferJob) -> Result<(), TransferJobStoreError>;

    /// Every pending job sharing a job id, in no particular order.
    async fn pending(&self, jid: &JobId) -> Result<Vec<TransferJob>, TransferJobStoreError>;

    /// Remove and return a pending job.
    async fn take(
        &self,
        key: &TransferJobKey,
    ) -> Result<Option<TransferJob>, TransferJobStoreError>;
}
