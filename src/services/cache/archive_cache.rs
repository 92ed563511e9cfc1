//! Content-addressed archive cache with a bounded storage budget.
//!
//! One file per content hash under a flat cache root, named by the hash
//! value. Admission and eviction keep the on-disk total within the quota;
//! eviction is least-recently-accessed first, and entries pinned by an
//! in-flight installation session are deferred until the pin drops.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::SystemTime;

use filetime::FileTime;
use tokio::sync::Mutex as TokioMutex;

use crate::types::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub hash: String,
    pub path: PathBuf,
    pub size: u64,
    pub last_access: SystemTime,
}

struct CacheState {
    quota: u64,
    entries: HashMap<String, CacheEntry>,
    /// Hash -> number of live pins. Pinned entries are never evicted.
    pins: HashMap<String, usize>,
}

struct CacheInner {
    root: PathBuf,
    state: StdMutex<CacheState>,
    /// Per-hash write serialization: at most one physical write per hash.
    write_locks: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

#[derive(Clone)]
pub struct ArchiveCache {
    inner: Arc<CacheInner>,
}

/// RAII guard keeping one cache entry safe from eviction. Dropping the
/// pin runs a deferred eviction pass.
pub struct CachePin {
    hash: String,
    inner: Arc<CacheInner>,
}

impl Drop for CachePin {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().unwrap();
        match state.pins.get_mut(&self.hash) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                state.pins.remove(&self.hash);
            }
            None => {}
        }
        // The entry may have been due for eviction while pinned.
        CacheInner::evict_locked(&mut state, None);
    }
}

/// Lowercase hex digest used as the cache key.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

impl ArchiveCache {
    /// Open the cache over an existing directory, rebuilding the index
    /// from file sizes and modification times.
    pub fn open(root: &Path, quota_bytes: u64) -> EngineResult<Self> {
        fs::create_dir_all(root).map_err(|e| EngineError::CacheIo(e.to_string()))?;

        let mut entries = HashMap::new();
        let dir = fs::read_dir(root).map_err(|e| EngineError::CacheIo(e.to_string()))?;
        for entry in dir.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Leftover partial writes are not valid entries.
            if name.starts_with('.') || name.contains('.') {
                log::debug!("[Cache] Skipping non-entry file: {}", path.display());
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let last_access = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.insert(
                name.to_string(),
                CacheEntry {
                    hash: name.to_string(),
                    path: path.clone(),
                    size: meta.len(),
                    last_access,
                },
            );
        }

        log::info!(
            "[Cache] Opened with {} entries, quota {} bytes",
            entries.len(),
            quota_bytes
        );

        let cache = Self {
            inner: Arc::new(CacheInner {
                root: root.to_path_buf(),
                state: StdMutex::new(CacheState {
                    quota: quota_bytes,
                    entries,
                    pins: HashMap::new(),
                }),
                write_locks: StdMutex::new(HashMap::new()),
            }),
        };

        // The previous session may have run with a larger budget.
        cache.inner.evict_pass(None);
        Ok(cache)
    }

    /// Store `bytes` under its verified content hash. Deduplicates: when
    /// the hash is already cached, the existing path is returned without
    /// writing.
    pub async fn put(&self, bytes: Vec<u8>, declared_hash: &str) -> EngineResult<PathBuf> {
        let computed = hash_bytes(&bytes);
        if !computed.eq_ignore_ascii_case(declared_hash) {
            return Err(EngineError::HashMismatch {
                declared: declared_hash.to_string(),
                computed,
            });
        }

        let write_lock = self.inner.write_lock(&computed);
        let _guard = write_lock.lock().await;

        // A concurrent put for the same hash may have won the race.
        if let Some(path) = self.inner.touch(&computed) {
            log::debug!("[Cache] Dedup hit for {computed}");
            return Ok(path);
        }

        let inner = self.inner.clone();
        let hash = computed.clone();
        tokio::task::spawn_blocking(move || inner.write_and_admit(&hash, &bytes))
            .await
            .map_err(|e| EngineError::CacheIo(format!("cache write task failed: {e}")))?
    }

    /// Temp file in the cache root, for callers that stream a payload to
    /// disk before admission via [`ArchiveCache::put_from_file`].
    pub fn staging_file(&self) -> EngineResult<tempfile::NamedTempFile> {
        tempfile::NamedTempFile::new_in(&self.inner.root)
            .map_err(|e| EngineError::CacheIo(e.to_string()))
    }

    /// Admit an already-written temp file whose contents hash to
    /// `computed_hash`. Deduplicates like [`ArchiveCache::put`]; on a
    /// dedup hit the temp file is discarded.
    pub async fn put_from_file(
        &self,
        tmp: tempfile::NamedTempFile,
        declared_hash: &str,
        computed_hash: &str,
    ) -> EngineResult<PathBuf> {
        if !computed_hash.eq_ignore_ascii_case(declared_hash) {
            return Err(EngineError::HashMismatch {
                declared: declared_hash.to_string(),
                computed: computed_hash.to_string(),
            });
        }
        let hash = computed_hash.to_ascii_lowercase();

        let write_lock = self.inner.write_lock(&hash);
        let _guard = write_lock.lock().await;

        if let Some(path) = self.inner.touch(&hash) {
            log::debug!("[Cache] Dedup hit for {hash}");
            return Ok(path);
        }

        let size = tmp
            .as_file()
            .metadata()
            .map_err(|e| EngineError::CacheIo(e.to_string()))?
            .len();
        self.inner.admit(&hash, tmp, size)
    }

    /// Cached path for `hash`, bumping its last-access time. Never touches
    /// the network.
    pub fn try_get_by_hash(&self, hash: &str) -> Option<PathBuf> {
        self.inner.touch(hash)
    }

    /// Reconfigure the size budget, evicting immediately if the current
    /// total exceeds it.
    pub fn set_quota(&self, max_bytes: u64) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.quota = max_bytes;
        }
        self.inner.evict_pass(None);
    }

    /// Pin an entry against eviction for the lifetime of the returned
    /// guard. Returns `None` when the hash is not cached.
    pub fn pin(&self, hash: &str) -> Option<CachePin> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.entries.contains_key(hash) {
            return None;
        }
        *state.pins.entry(hash.to_string()).or_insert(0) += 1;
        Some(CachePin {
            hash: hash.to_string(),
            inner: self.inner.clone(),
        })
    }

    /// Remove every unpinned entry regardless of quota.
    pub fn clear(&self) -> EngineResult<usize> {
        let mut state = self.inner.state.lock().unwrap();
        let victims: Vec<String> = state
            .entries
            .keys()
            .filter(|h| !state.pins.contains_key(*h))
            .cloned()
            .collect();

        let mut removed = 0;
        for hash in victims {
            if let Some(entry) = state.entries.remove(&hash) {
                if let Err(e) = fs::remove_file(&entry.path) {
                    log::warn!("[Cache] Failed to remove {}: {e}", entry.path.display());
                }
                removed += 1;
            }
        }
        log::info!("[Cache] Cleared {removed} entries");
        Ok(removed)
    }

    pub fn total_size(&self) -> u64 {
        let state = self.inner.state.lock().unwrap();
        state.entries.values().map(|e| e.size).sum()
    }

    pub fn contains(&self, hash: &str) -> bool {
        let state = self.inner.state.lock().unwrap();
        state.entries.contains_key(hash)
    }

    #[cfg(test)]
    pub(crate) fn tracked_write_locks(&self) -> usize {
        self.inner.write_locks.lock().unwrap().len()
    }
}

impl CacheInner {
    fn write_lock(&self, hash: &str) -> Arc<TokioMutex<()>> {
        let mut map = self.write_locks.lock().unwrap();
        // Shed locks nobody holds so the map stays bounded by in-flight
        // writes, not every hash ever written.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(hash.to_string())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// Look up an entry and refresh its last-access time, in memory and on
    /// the file itself. Drops index entries whose backing file vanished.
    fn touch(&self, hash: &str) -> Option<PathBuf> {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.get_mut(hash)?;
        if !entry.path.exists() {
            log::warn!("[Cache] Entry for {hash} vanished on disk, dropping");
            state.entries.remove(hash);
            return None;
        }
        let now = SystemTime::now();
        entry.last_access = now;
        let path = entry.path.clone();
        if let Err(e) = filetime::set_file_mtime(&path, FileTime::from_system_time(now)) {
            log::debug!("[Cache] Could not stamp access time on {}: {e}", path.display());
        }
        Some(path)
    }

    /// Write the payload to a temp file in the cache root, then admit it.
    fn write_and_admit(self: Arc<Self>, hash: &str, bytes: &[u8]) -> EngineResult<PathBuf> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| EngineError::CacheIo(e.to_string()))?;
        tmp.write_all(bytes)
            .map_err(|e| EngineError::CacheIo(e.to_string()))?;
        tmp.flush().map_err(|e| EngineError::CacheIo(e.to_string()))?;
        self.admit(hash, tmp, bytes.len() as u64)
    }

    /// Rename a fully-written temp file into place under its hash name,
    /// so a crash mid-write never leaves a corrupt entry visible, and
    /// index it.
    fn admit(&self, hash: &str, tmp: tempfile::NamedTempFile, size: u64) -> EngineResult<PathBuf> {
        let final_path = self.root.join(hash);
        tmp.persist(&final_path)
            .map_err(|e| EngineError::CacheIo(e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        state.entries.insert(
            hash.to_string(),
            CacheEntry {
                hash: hash.to_string(),
                path: final_path.clone(),
                size,
                last_access: SystemTime::now(),
            },
        );
        Self::evict_locked(&mut state, Some(hash));

        log::info!("[Cache] Admitted {hash} ({size} bytes)");
        Ok(final_path)
    }

    fn evict_pass(&self, exclude: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        Self::evict_locked(&mut state, exclude);
    }

    /// Remove least-recently-accessed entries until the total fits the
    /// quota. Skips pinned entries and the entry being admitted.
    fn evict_locked(state: &mut CacheState, exclude: Option<&str>) {
        loop {
            let total: u64 = state.entries.values().map(|e| e.size).sum();
            if total <= state.quota {
                return;
            }

            let victim = state
                .entries
                .values()
                .filter(|e| Some(e.hash.as_str()) != exclude)
                .filter(|e| !state.pins.contains_key(&e.hash))
                .min_by_key(|e| e.last_access)
                .map(|e| e.hash.clone());

            let Some(hash) = victim else {
                log::warn!(
                    "[Cache] Over quota ({total} bytes) but no evictable entry; deferring"
                );
                return;
            };

            if let Some(entry) = state.entries.remove(&hash) {
                log::info!("[Cache] Evicting {hash} ({} bytes)", entry.size);
                if let Err(e) = fs::remove_file(&entry.path) {
                    log::warn!("[Cache] Failed to evict {}: {e}", entry.path.display());
                }
            }
        }
    }
}
