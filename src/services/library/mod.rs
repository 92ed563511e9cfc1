//! The mod library: the authoritative on-disk tree of mod folders grouped
//! by owning object, plus the in-memory identity index over it.
//!
//! Layout: `<library_root>/<owner>/<mod folder>`. A folder is disabled when
//! its name carries the `DISABLED ` prefix; identity lives in the sidecar
//! document and survives renames, toggles and transfers.

pub mod settings;
pub mod trash;
pub mod types;

#[cfg(test)]
#[path = "tests/library_tests.rs"]
mod library_tests;

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod settings_tests;

#[cfg(test)]
#[path = "tests/trash_tests.rs"]
mod trash_tests;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex as StdMutex};

use regex::Regex;

use crate::services::core::resource_lock::ResourceLocks;
use crate::services::fs_utils;
use crate::types::errors::{EngineError, EngineResult};
use crate::DISABLED_PREFIX;
use settings::{ModDocument, ModSettings, ModSettingsUpdate, SettingsCache, SETTINGS_FILE};
use types::{BulkActionError, BulkResult, ModFolder};

static DISABLED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(disabled|disable|dis)[_\-\s]*").expect("valid regex"));

/// True when a folder name carries a disabled marker.
pub fn is_disabled_name(name: &str) -> bool {
    DISABLED_RE.is_match(name)
}

/// Folder name with any disabled marker stripped.
pub fn display_name(name: &str) -> String {
    DISABLED_RE.replace(name, "").to_string()
}

pub struct ModLibrary {
    root: PathBuf,
    trash_dir: PathBuf,
    index: StdMutex<HashMap<String, ModFolder>>,
    owner_locks: ResourceLocks,
    settings_cache: SettingsCache,
}

impl ModLibrary {
    /// Open the library over `root`, scanning the two-level tree and
    /// adopting any folder that has no identity yet.
    pub fn open(root: &Path, trash_dir: &Path) -> EngineResult<Self> {
        fs::create_dir_all(root)?;
        let library = Self {
            root: root.to_path_buf(),
            trash_dir: trash_dir.to_path_buf(),
            index: StdMutex::new(HashMap::new()),
            owner_locks: ResourceLocks::new(),
            settings_cache: SettingsCache::new(),
        };
        library.rescan()?;
        Ok(library)
    }

    /// Rebuild the identity index from disk.
    pub fn rescan(&self) -> EngineResult<()> {
        let mut mods = HashMap::new();

        for owner_entry in fs::read_dir(&self.root)?.flatten() {
            let owner_path = owner_entry.path();
            if !owner_path.is_dir() {
                continue;
            }
            let owner = owner_entry.file_name().to_string_lossy().to_string();
            if owner.starts_with('.') {
                continue;
            }

            for mod_entry in fs::read_dir(&owner_path)?.flatten() {
                let mod_path = mod_entry.path();
                if !mod_path.is_dir() {
                    continue;
                }
                let folder_name = mod_entry.file_name().to_string_lossy().to_string();
                let id = settings::ensure_identity(&mod_path).unwrap_or_else(|e| {
                    // Do not clobber an unreadable document; fall back to a
                    // stable path-derived identity for this session.
                    log::warn!(
                        "[Library] Unreadable sidecar in {}: {e}; using derived id",
                        mod_path.display()
                    );
                    blake3::hash(mod_path.to_string_lossy().as_bytes())
                        .to_hex()
                        .to_string()
                });
                mods.insert(
                    id.clone(),
                    ModFolder {
                        id,
                        owner: owner.clone(),
                        path: mod_path,
                        is_enabled: !is_disabled_name(&folder_name),
                    },
                );
            }
        }

        log::info!("[Library] Indexed {} mods under {}", mods.len(), self.root.display());
        *self.index.lock().unwrap() = mods;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    pub fn get(&self, mod_id: &str) -> Option<ModFolder> {
        self.index.lock().unwrap().get(mod_id).cloned()
    }

    pub fn list(&self) -> Vec<ModFolder> {
        self.index.lock().unwrap().values().cloned().collect()
    }

    pub fn list_owner(&self, owner: &str) -> Vec<ModFolder> {
        self.index
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.owner == owner)
            .cloned()
            .collect()
    }

    /// Enabled mods in a stable order (by owner, then folder name).
    pub fn enabled_mods(&self) -> Vec<ModFolder> {
        let mut mods: Vec<ModFolder> = self
            .index
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.is_enabled)
            .cloned()
            .collect();
        mods.sort_by(|a, b| (&a.owner, a.folder_name()).cmp(&(&b.owner, b.folder_name())));
        mods
    }

    pub async fn enable(&self, mod_id: &str) -> EngineResult<PathBuf> {
        self.set_enabled(mod_id, true).await
    }

    pub async fn disable(&self, mod_id: &str) -> EngineResult<PathBuf> {
        self.set_enabled(mod_id, false).await
    }

    /// Flip the enabled marker by renaming the folder. Idempotent: asking
    /// for the current state is a no-op, not an error.
    pub async fn set_enabled(&self, mod_id: &str, enable: bool) -> EngineResult<PathBuf> {
        let found = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        let _guard = self.owner_locks.acquire(&found.owner).await?;

        // Re-read under the lock; a concurrent mutation may have moved it.
        let current = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        if current.is_enabled == enable {
            return Ok(current.path);
        }

        let name = current.folder_name();
        let new_name = if enable {
            display_name(&name)
        } else {
            format!("{DISABLED_PREFIX}{name}")
        };
        let new_path = current
            .path
            .parent()
            .unwrap_or(&self.root)
            .join(&new_name);
        if new_path.exists() {
            return Err(EngineError::NameCollision {
                owner: current.owner.clone(),
                name: new_name,
            });
        }

        fs::rename(&current.path, &new_path)?;
        log::info!(
            "[Library] {} {}",
            if enable { "Enabled" } else { "Disabled" },
            display_name(&name)
        );

        let mut index = self.index.lock().unwrap();
        if let Some(entry) = index.get_mut(mod_id) {
            entry.path = new_path.clone();
            entry.is_enabled = enable;
        }
        Ok(new_path)
    }

    /// Move a batch of mods under a different owning object.
    ///
    /// Collision validation is all-or-nothing: if any destination name is
    /// already taken (on disk or within the batch itself) the whole call
    /// fails with `NameCollision` before a single folder has moved.
    pub async fn transfer(&self, mod_ids: &[String], dest_owner: &str) -> EngineResult<BulkResult> {
        let mut moves: Vec<ModFolder> = Vec::new();
        let mut failures: Vec<BulkActionError> = Vec::new();
        for id in mod_ids {
            match self.get(id) {
                Some(m) => moves.push(m),
                None => failures.push(BulkActionError {
                    id: id.clone(),
                    error: format!("Mod not found: {id}"),
                }),
            }
        }

        let mut lock_keys: Vec<&str> = moves.iter().map(|m| m.owner.as_str()).collect();
        lock_keys.push(dest_owner);
        let _guards = self.owner_locks.acquire_many(&lock_keys).await?;

        let dest_dir = self.root.join(dest_owner);
        let mut taken: HashSet<String> = HashSet::new();
        if dest_dir.exists() {
            for entry in fs::read_dir(&dest_dir)?.flatten() {
                taken.insert(entry.file_name().to_string_lossy().to_lowercase());
            }
        }
        for m in &moves {
            let name = m.folder_name().to_lowercase();
            if !taken.insert(name) {
                return Err(EngineError::NameCollision {
                    owner: dest_owner.to_string(),
                    name: m.folder_name(),
                });
            }
        }

        fs::create_dir_all(&dest_dir)?;
        let mut success = Vec::new();
        for m in moves {
            let dest = dest_dir.join(m.folder_name());
            match fs_utils::move_path(&m.path, &dest) {
                Ok(()) => {
                    let mut index = self.index.lock().unwrap();
                    if let Some(entry) = index.get_mut(&m.id) {
                        entry.owner = dest_owner.to_string();
                        entry.path = dest;
                    }
                    success.push(m.id);
                }
                Err(e) => failures.push(BulkActionError {
                    id: m.id.clone(),
                    error: e.to_string(),
                }),
            }
        }

        Ok(BulkResult { success, failures })
    }

    /// Delete a batch of mods, recording per-mod errors without aborting
    /// the rest of the batch.
    pub async fn delete(&self, mod_ids: &[String], to_trash: bool) -> EngineResult<BulkResult> {
        let mut success = Vec::new();
        let mut failures = Vec::new();

        for id in mod_ids {
            match self.delete_one(id, to_trash).await {
                Ok(()) => success.push(id.clone()),
                Err(e) => failures.push(BulkActionError {
                    id: id.clone(),
                    error: e.to_string(),
                }),
            }
        }
        Ok(BulkResult { success, failures })
    }

    async fn delete_one(&self, mod_id: &str, to_trash: bool) -> EngineResult<()> {
        let m = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        let _guard = self.owner_locks.acquire(&m.owner).await?;

        if to_trash {
            trash::move_to_trash(&m.path, &self.trash_dir, Some(m.owner.clone()))?;
        } else {
            fs::remove_dir_all(&m.path)?;
        }

        self.index.lock().unwrap().remove(mod_id);
        self.settings_cache.invalidate(mod_id);
        log::info!("[Library] Deleted {}", m.display_name());
        Ok(())
    }

    /// Remove folders that are empty or hold only internal metadata files.
    /// A folder containing any user subfolder survives; empty owner
    /// directories are removed last. Returns the removed set.
    pub async fn clean_empty_folders(&self) -> EngineResult<Vec<PathBuf>> {
        let mut removed = Vec::new();

        let owners: Vec<PathBuf> = fs::read_dir(&self.root)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();

        for owner_dir in owners {
            let owner = owner_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let _guard = self.owner_locks.acquire(&owner).await?;

            for child in fs::read_dir(&owner_dir)?.flatten() {
                let child_path = child.path();
                if !child_path.is_dir() {
                    continue;
                }
                if Self::holds_only_metadata(&child_path)? {
                    fs::remove_dir_all(&child_path)?;
                    self.drop_index_path(&child_path);
                    removed.push(child_path);
                }
            }

            if fs::read_dir(&owner_dir)?.next().is_none() {
                fs::remove_dir(&owner_dir)?;
                removed.push(owner_dir);
            }
        }

        if !removed.is_empty() {
            log::info!("[Library] Cleaned {} empty folders", removed.len());
        }
        Ok(removed)
    }

    fn holds_only_metadata(dir: &Path) -> EngineResult<bool> {
        for entry in fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                return Ok(false);
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name != SETTINGS_FILE {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn drop_index_path(&self, path: &Path) {
        let mut index = self.index.lock().unwrap();
        index.retain(|_, m| m.path != path);
    }

    /// Full settings document for a mod. `SettingsNotFound` means the mod
    /// has never been configured, which is distinct from a malformed file.
    pub fn resolve_settings(&self, mod_id: &str) -> EngineResult<ModSettings> {
        let m = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        let doc = self.settings_cache.read(mod_id, &m.path)?;
        doc.and_then(|d| d.settings)
            .ok_or_else(|| EngineError::SettingsNotFound(mod_id.to_string()))
    }

    /// Sidecar document (identity plus metadata), if present.
    pub fn resolve_document(&self, mod_id: &str) -> EngineResult<Option<ModDocument>> {
        let m = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        self.settings_cache.read(mod_id, &m.path)
    }

    /// Merge an update into the sidecar document, creating it lazily.
    pub fn update_settings(
        &self,
        mod_id: &str,
        update: &ModSettingsUpdate,
    ) -> EngineResult<ModDocument> {
        let m = self
            .get(mod_id)
            .ok_or_else(|| EngineError::ModNotFound(mod_id.to_string()))?;
        let doc = settings::update_document(&m.path, mod_id, update)?;
        self.settings_cache.invalidate(mod_id);
        Ok(doc)
    }

    /// Commit a staged tree under the target owner. The single rename into
    /// the owner directory is the atomic commit point; before it runs, no
    /// partially installed mod is visible to the index.
    pub async fn commit_staged(&self, staged_dir: &Path, owner: &str) -> EngineResult<ModFolder> {
        let _guard = self.owner_locks.acquire(owner).await?;

        let owner_dir = self.root.join(owner);
        fs::create_dir_all(&owner_dir)?;

        let name = staged_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EngineError::Document("staged tree has no folder name".into()))?;

        // New installs land disabled so a bad mod never activates by
        // accident; identity is written before the move so it travels
        // with the commit.
        let id = settings::ensure_identity(staged_dir)?;
        let dest = fs_utils::unique_destination(owner_dir.join(format!("{DISABLED_PREFIX}{name}")));
        fs_utils::move_path(staged_dir, &dest)?;

        let mod_folder = ModFolder {
            id: id.clone(),
            owner: owner.to_string(),
            path: dest,
            is_enabled: false,
        };
        self.index
            .lock()
            .unwrap()
            .insert(id, mod_folder.clone());

        log::info!(
            "[Library] Committed '{}' under {owner}",
            mod_folder.display_name()
        );
        Ok(mod_folder)
    }
}
