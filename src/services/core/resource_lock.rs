//! Keyed locks for structural file-system mutations.
//!
//! One lock per resource key (an owner directory in the library, a content
//! hash in the cache) so that mutations of the same resource serialize while
//! unrelated resources proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::errors::{EngineError, EngineResult};

/// How long a caller waits on a contended resource before giving up
/// with `Busy`.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ResourceLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().unwrap();
        // Shed idle entries so the map stays bounded by the set of keys
        // currently held or awaited, not every key ever touched.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Acquire the lock for one key, waiting up to the acquire timeout.
    pub async fn acquire(&self, key: &str) -> EngineResult<OwnedMutexGuard<()>> {
        let lock = self.lock_for(key);
        match tokio::time::timeout(ACQUIRE_TIMEOUT, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(EngineError::Busy(key.to_string())),
        }
    }

    /// Acquire several keys at once, in sorted order so that overlapping
    /// batches cannot deadlock against each other.
    pub async fn acquire_many(&self, keys: &[&str]) -> EngineResult<Vec<OwnedMutexGuard<()>>> {
        let mut sorted: Vec<&str> = keys.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.acquire(key).await?);
        }
        Ok(guards)
    }
}

impl Default for ResourceLocks {
    fn default() -> Self {
        Self::new()
    }
}
