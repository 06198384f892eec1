//! Process-local store of pending transfer jobs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{TransferJobStore, TransferJobStoreError};
use crate::domain::{JobId, TransferJob, TransferJobKey};

/// Pending jobs keyed by [`TransferJobKey`]. Jobs do not survive a restart;
/// the remote service's callback for a lost job is answered with
/// `job_not_found`.
#[derive(Debug, Default)]
pub struct InMemoryTransferJobStore {
    jobs: Mutex<HashMap<TransferJobKey, TransferJob>>,
}

impl InMemoryTransferJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<TransferJobKey, TransferJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransferJobStore for InMemoryTransferJobStore {
    async fn insert(&self, job: TransferJob) -> Result<(), TransferJobStoreError> {
        let key = job.key();
        let mut jobs = self.jobs();
        if jobs.contains_key(&key) {
            return Err(TransferJobStoreError::duplicate(key.to_string()));
        }
        jobs.insert(key, job);
        Ok(())
    }

    async fn pending(&self, jid: &JobId) -> Result<Vec<TransferJob>, TransferJobStoreError> {
        Ok(self
            .jobs()
            .values()
            .filter(|job| &job.id == jid)
            .cloned()
            .collect())
    }

    async fn take(
        &self,
        key: &TransferJobKey,
    ) -> Result<Option<TransferJob>, TransferJobStoreError> {
        Ok(self.jobs().remove(key))
    }
}
