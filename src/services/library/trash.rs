//! Recoverable app-level trash for deleted mod folders.
//!
//! Each deleted folder moves to `<trash_dir>/<uuid>/` next to a
//! `metadata.json` carrying what is needed to restore it. The OS recycle
//! bin is not used.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::fs_utils;
use crate::types::errors::{EngineError, EngineResult};

const TRASH_METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashRecord {
    /// Unique id of this trash entry (also its directory name).
    pub id: String,
    pub original_path: String,
    pub original_name: String,
    pub owner: Option<String>,
    pub deleted_at: String,
    pub size_bytes: u64,
}

/// Move a mod folder into the trash. Writes the metadata first so a crash
/// between the two steps leaves a restorable entry, not an orphan.
pub fn move_to_trash(
    source: &Path,
    trash_dir: &Path,
    owner: Option<String>,
) -> EngineResult<TrashRecord> {
    if !source.is_dir() {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("not a directory: {}", source.display()),
        )));
    }
    let folder_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| EngineError::Document("trash source has no folder name".into()))?;

    let entry_id = Uuid::new_v4().to_string();
    let entry_dir = trash_dir.join(&entry_id);
    fs::create_dir_all(&entry_dir)?;

    let record = TrashRecord {
        id: entry_id.clone(),
        original_path: source.to_string_lossy().to_string(),
        original_name: folder_name.clone(),
        owner,
        deleted_at: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        size_bytes: fs_utils::dir_size(source),
    };

    let json = serde_json::to_string_pretty(&record)
        .map_err(|e| EngineError::Document(e.to_string()))?;
    fs::write(entry_dir.join(TRASH_METADATA_FILE), json)?;

    fs_utils::move_path(source, &entry_dir.join(&folder_name))?;
    log::info!("[Trash] Moved '{}' to trash ({})", folder_name, entry_id);
    Ok(record)
}

/// Restore a trashed entry to its original location. Fails when the
/// original path has been reoccupied.
pub fn restore_from_trash(entry_id: &str, trash_dir: &Path) -> EngineResult<PathBuf> {
    let entry_dir = trash_dir.join(entry_id);
    let raw = fs::read_to_string(entry_dir.join(TRASH_METADATA_FILE))
        .map_err(|_| EngineError::Document(format!("trash entry not found: {entry_id}")))?;
    let record: TrashRecord = serde_json::from_str(&raw)
        .map_err(|e| EngineError::Document(format!("invalid trash metadata: {e}")))?;

    let original = PathBuf::from(&record.original_path);
    if original.exists() {
        return Err(EngineError::NameCollision {
            owner: record.owner.unwrap_or_default(),
            name: record.original_name,
        });
    }

    let content = entry_dir.join(&record.original_name);
    if !content.exists() {
        return Err(EngineError::Document(format!(
            "trash content missing for entry {entry_id}"
        )));
    }

    fs_utils::move_path(&content, &original)?;
    fs::remove_dir_all(&entry_dir)?;
    log::info!("[Trash] Restored '{}'", record.original_name);
    Ok(original)
}

/// Every restorable entry, newest first.
pub fn list_trash(trash_dir: &Path) -> EngineResult<Vec<TrashRecord>> {
    if !trash_dir.exists() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in fs::read_dir(trash_dir)?.flatten() {
        let meta_path = entry.path().join(TRASH_METADATA_FILE);
        if let Ok(raw) = fs::read_to_string(&meta_path) {
            match serde_json::from_str::<TrashRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("[Trash] Skipping unreadable entry: {e}"),
            }
        }
    }
    records.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
    Ok(records)
}

/// Permanently delete all trash entries, returning how many were removed.
pub fn empty_trash(trash_dir: &Path) -> EngineResult<u64> {
    if !trash_dir.exists() {
        return Ok(0);
    }
    let mut count = 0u64;
    for entry in fs::read_dir(trash_dir)?.flatten() {
        if entry.path().is_dir() {
            fs::remove_dir_all(entry.path())?;
            count += 1;
        }
    }
    log::info!("[Trash] Emptied trash: {count} entries removed");
    Ok(count)
}
