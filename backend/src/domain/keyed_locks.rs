//! Per-key async serialisation points.
//!
//! Coordinators hold one lock per account around storm account mutations and
//! migration completions, and one per enterprise around bulk updates. Entries
//! are dropped once no guard or waiter references them.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard releasing its key when dropped.
pub type KeyedGuard = OwnedMutexGuard<()>;

/// A map of async mutexes created on demand.
///
/// # Examples
/// ```
/// use storm_backend::domain::KeyedLocks;
///
/// # tokio_test_block_on(async {
/// let locks = KeyedLocks::default();
/// let guard = locks.lock(7_i64).await;
/// assert_eq!(locks.len(), 1);
/// drop(guard);
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(future: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().expect("runtime").block_on(future)
/// # }
/// ```
#[derive(Debug)]
pub struct KeyedLocks<K> {
    entries: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> KeyedGuard {
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            // Only the map holds idle entries.
            entries.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(entries.entry(key).or_default())
        };
        slot.lock_owned().await
    }

    /// Acquire several keys in ascending order.
    pub async fn lock_all(&self, mut keys: Vec<K>) -> Vec<KeyedGuard>
    where
        K: Ord,
    {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    /// Number of tracked keys, including idle ones not yet pruned.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn same_key_waits_for_release() {
        let locks = Arc::new(KeyedLocks::default());
        let guard = locks.lock(1_i64).await;

        let contender = Arc::clone(&locks);
        let blocked = timeout(Duration::from_millis(50), contender.lock(1)).await;
        assert!(blocked.is_err(), "second lock must wait");

        drop(guard);
        let acquired = timeout(Duration::from_millis(500), locks.lock(1)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = KeyedLocks::default();
        let _first = locks.lock(1_i64).await;
        let second = timeout(Duration::from_millis(50), locks.lock(2)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = KeyedLocks::default();
        drop(locks.lock(1_i64).await);
        drop(locks.lock(2_i64).await);
        let _held = locks.lock(3_i64).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn lock_all_deduplicates_keys() {
        let locks = KeyedLocks::default();
        let guards = locks.lock_all(vec![3_i64, 1, 3, 2]).await;
        assert_eq!(guards.len(), 3);
    }
}
