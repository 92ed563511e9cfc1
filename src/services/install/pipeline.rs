//! The installation pipeline: cached archive in, committed mod out.
//!
//! `Idle -> Extracting -> Staged -> Installing -> Installed`, with
//! `Canceled` and `Error` terminals. The cancel token is checked at phase
//! boundaries only, never inside a file write, and the single move into
//! the owner directory is the atomic commit point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::archive_name;
use super::extract;
use super::session::{InstallSession, InstallState};
use crate::services::cache::ArchiveCache;
use crate::services::core::cancel::CancelToken;
use crate::services::library::settings::{self, ModSettingsUpdate};
use crate::services::library::types::ModFolder;
use crate::services::library::ModLibrary;
use crate::types::errors::{EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Content hash of the archive in the cache.
    pub archive_hash: String,
    /// Four-field archive name carrying the mod name and payload format.
    pub archive_name: String,
    /// Owning object the mod installs under.
    pub owner: String,
    /// Download origin, recorded in the sidecar document when present.
    pub source_url: Option<String>,
    /// Preferences applied after commit; failures here are warnings.
    pub default_preferences: Option<HashMap<String, String>>,
}

#[derive(Debug)]
pub struct InstallOutcome {
    pub mod_folder: ModFolder,
    pub warnings: Vec<String>,
}

/// Run one installation to a terminal state.
///
/// The source cache entry stays pinned for the whole session so eviction
/// cannot pull the archive out from under the extraction.
pub async fn run_install(
    cache: &ArchiveCache,
    library: &ModLibrary,
    request: &InstallRequest,
    cancel: &CancelToken,
    session: &InstallSession,
) -> EngineResult<InstallOutcome> {
    let _pin = cache.pin(&request.archive_hash).ok_or_else(|| {
        EngineError::CacheIo(format!("no cache entry for hash {}", request.archive_hash))
    })?;

    let staging = TempDir::with_prefix("skinvault-install-").map_err(EngineError::Io)?;

    let result = run_phases(cache, library, request, cancel, session, &staging).await;
    match result {
        Ok(outcome) => {
            session.set(InstallState::Installed);
            log::info!(
                "[Install] Installed '{}' under {}",
                outcome.mod_folder.display_name(),
                request.owner
            );
            Ok(outcome)
        }
        Err(EngineError::Canceled) => {
            // Staging is dropped with the TempDir; nothing committed.
            session.set(InstallState::Canceled);
            log::info!("[Install] Canceled before commit");
            Err(EngineError::Canceled)
        }
        Err(e) => {
            session.set(InstallState::Error(e.to_string()));
            log::error!("[Install] Failed: {e}");
            Err(e)
        }
    }
}

async fn run_phases(
    cache: &ArchiveCache,
    library: &ModLibrary,
    request: &InstallRequest,
    cancel: &CancelToken,
    session: &InstallSession,
    staging: &TempDir,
) -> EngineResult<InstallOutcome> {
    cancel.checkpoint()?;
    session.set(InstallState::Extracting);

    let name = archive_name::parse(&request.archive_name)?;
    let archive_path = cache.try_get_by_hash(&request.archive_hash).ok_or_else(|| {
        EngineError::CacheIo(format!("no cache entry for hash {}", request.archive_hash))
    })?;

    let extract_root = staging.path().join("extract");
    let format = name.format;
    let archive = archive_path.clone();
    let dest = extract_root.clone();
    tokio::task::spawn_blocking(move || extract::extract_archive(format, &archive, &dest))
        .await
        .map_err(|e| EngineError::CacheIo(format!("extraction task failed: {e}")))??;

    cancel.checkpoint()?;
    session.set(InstallState::Staged);

    let staged_root = normalize_staged(staging, &extract_root, &name.mod_name)?;
    if let Some(url) = &request.source_url {
        let id = settings::ensure_identity(&staged_root)?;
        settings::update_document(
            &staged_root,
            &id,
            &ModSettingsUpdate {
                source_url: Some(url.clone()),
                ..Default::default()
            },
        )?;
    }

    cancel.checkpoint()?;
    session.set(InstallState::Installing);

    // Atomic commit point. From here on the install is complete and
    // cancellation is no longer honored.
    let mod_folder = library.commit_staged(&staged_root, &request.owner).await?;

    let mut warnings = Vec::new();
    if let Some(prefs) = &request.default_preferences {
        let update = ModSettingsUpdate {
            preferences: Some(prefs.clone()),
            ..Default::default()
        };
        if let Err(e) = library.update_settings(&mod_folder.id, &update) {
            log::warn!("[Install] Default preferences not applied: {e}");
            warnings.push(format!("default preferences not applied: {e}"));
        }
    }

    Ok(InstallOutcome {
        mod_folder,
        warnings,
    })
}

/// Give the extracted tree its final folder name inside staging.
fn normalize_staged(
    staging: &TempDir,
    extract_root: &Path,
    mod_name: &str,
) -> EngineResult<PathBuf> {
    let staged_root = staging.path().join(mod_name);
    std::fs::rename(extract_root, &staged_root)?;
    Ok(staged_root)
}
