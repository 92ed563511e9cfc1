//! Engine configuration.
//!
//! A single explicit struct built once at startup and handed to every
//! component constructor. Components never look paths up through ambient
//! global state.

use std::fs;
use std::path::{Path, PathBuf};

/// Default archive cache budget when the host application has not
/// configured one (the external setting is expressed in gibibytes).
pub const DEFAULT_CACHE_QUOTA_GIB: u64 = 10;

pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the mod library tree: `<library_root>/<owner>/<mod folder>`.
    pub library_root: PathBuf,
    /// Flat directory holding one cached archive file per content hash.
    pub cache_dir: PathBuf,
    /// App-level recoverable trash for deleted mod folders.
    pub trash_dir: PathBuf,
    /// Directory for engine documents (`presets.json`, `commands.json`).
    pub data_dir: PathBuf,
    /// Archive cache size budget in bytes.
    pub cache_quota_bytes: u64,
}

impl EngineConfig {
    /// Standard layout under a single application data directory.
    pub fn under_data_dir(app_data_dir: &Path, library_root: PathBuf) -> Self {
        Self {
            library_root,
            cache_dir: app_data_dir.join("cache").join("archives"),
            trash_dir: app_data_dir.join("trash"),
            data_dir: app_data_dir.to_path_buf(),
            cache_quota_bytes: DEFAULT_CACHE_QUOTA_GIB * GIB,
        }
    }

    pub fn with_cache_quota_gib(mut self, gib: u64) -> Self {
        self.cache_quota_bytes = gib * GIB;
        self
    }

    pub fn presets_path(&self) -> PathBuf {
        self.data_dir.join("presets.json")
    }

    pub fn commands_path(&self) -> PathBuf {
        self.data_dir.join("commands.json")
    }

    /// Create every managed directory that does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.library_root,
            &self.cache_dir,
            &self.trash_dir,
            &self.data_dir,
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}
