//! The engine facade: constructs every component from one config and
//! wires the couplings between them.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::services::cache::ArchiveCache;
use crate::services::commands::{CommandOrchestrator, CommandStore};
use crate::services::core::cancel::CancelToken;
use crate::services::install::{self, InstallOutcome, InstallRequest, InstallSession};
use crate::services::library::types::BulkResult;
use crate::services::library::ModLibrary;
use crate::services::presets::PresetStore;
use crate::types::errors::EngineResult;

pub struct Engine {
    config: EngineConfig,
    cache: ArchiveCache,
    library: Arc<ModLibrary>,
    presets: Arc<PresetStore>,
    commands: Arc<CommandOrchestrator>,
}

impl Engine {
    /// Bring up every component over the configured directories.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        config.ensure_dirs()?;

        let cache = ArchiveCache::open(&config.cache_dir, config.cache_quota_bytes)?;
        let library = Arc::new(ModLibrary::open(&config.library_root, &config.trash_dir)?);
        let presets = Arc::new(PresetStore::open(&config.presets_path())?);
        let command_store = Arc::new(CommandStore::open(&config.commands_path())?);
        let commands = Arc::new(CommandOrchestrator::new(command_store));

        log::info!(
            "[Engine] Opened over {} ({} mods)",
            config.library_root.display(),
            library.list().len()
        );
        Ok(Self {
            config,
            cache,
            library,
            presets,
            commands,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    pub fn library(&self) -> &ModLibrary {
        &self.library
    }

    pub fn presets(&self) -> &PresetStore {
        &self.presets
    }

    pub fn commands(&self) -> &CommandOrchestrator {
        &self.commands
    }

    /// Download an archive into the cache, verifying its declared hash.
    pub async fn download_archive(
        &self,
        client: &reqwest::Client,
        url: &str,
        declared_hash: &str,
    ) -> EngineResult<std::path::PathBuf> {
        crate::services::cache::download::download_to_cache(&self.cache, client, url, declared_hash)
            .await
    }

    /// Install a cached archive under `owner`, driving a fresh session
    /// to a terminal state.
    pub async fn install(
        &self,
        request: &InstallRequest,
        cancel: &CancelToken,
        session: &InstallSession,
    ) -> EngineResult<InstallOutcome> {
        install::run_install(&self.cache, &self.library, request, cancel, session).await
    }

    /// Delete mods. With `clean_preset_refs` the mods' preset entries
    /// are removed first; without it they stay behind and are flagged
    /// `is_missing` on the next apply, so a caller can warn via
    /// [`Engine::presets_referencing`] and let the user decide.
    pub async fn delete_mods(
        &self,
        mod_ids: &[String],
        to_trash: bool,
        clean_preset_refs: bool,
    ) -> EngineResult<BulkResult> {
        if clean_preset_refs {
            let referencing = self.presets.find_presets_referencing(mod_ids);
            for (mod_id, preset_names) in &referencing {
                for preset_name in preset_names {
                    if let Err(e) = self.presets.delete_entry(preset_name, mod_id) {
                        log::warn!(
                            "[Engine] Preset cleanup for {mod_id} in '{preset_name}' failed: {e}"
                        );
                    }
                }
            }
        }
        self.library.delete(mod_ids, to_trash).await
    }

    /// Which presets still reference each of the given mods.
    pub fn presets_referencing(&self, mod_ids: &[String]) -> HashMap<String, Vec<String>> {
        self.presets.find_presets_referencing(mod_ids)
    }

    /// Terminate kill-on-exit command runs. Call before dropping the
    /// engine at host shutdown.
    pub fn shutdown(&self) {
        log::info!("[Engine] Shutting down");
        self.commands.shutdown();
    }
}
