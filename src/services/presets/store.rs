//! Named snapshots of the enabled set, persisted as one JSON document.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use chrono::Utc;

use super::types::{ApplyPresetResult, Preset, PresetEntry};
use crate::services::library::settings::ModSettingsUpdate;
use crate::services::library::ModLibrary;
use crate::types::errors::{EngineError, EngineResult};

pub struct PresetStore {
    path: PathBuf,
    presets: StdMutex<Vec<Preset>>,
}

impl PresetStore {
    /// Open the store over its JSON document, creating an empty store
    /// when the file does not exist yet.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let presets = if path.exists() {
            let raw = fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| EngineError::Document(format!("{}: {e}", path.display())))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            presets: StdMutex::new(presets),
        })
    }

    /// Snapshot the currently enabled mods, in stable order, with their
    /// resolved preference maps. Capturing an existing name replaces that
    /// preset.
    pub fn capture(&self, name: &str, library: &ModLibrary) -> EngineResult<Preset> {
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut entries = Vec::new();

        for m in library.enabled_mods() {
            let doc = library.resolve_document(&m.id)?;
            let (custom_name, source_url, preferences) = match doc {
                Some(d) => (
                    d.custom_name,
                    d.source_url,
                    d.settings.map(|s| s.preferences).unwrap_or_default(),
                ),
                None => (None, None, HashMap::new()),
            };
            entries.push(PresetEntry {
                mod_id: m.id.clone(),
                full_path: m.path.to_string_lossy().to_string(),
                custom_name,
                source_url,
                preferences,
                is_missing: false,
                added_at: now.clone(),
            });
        }

        let preset = Preset {
            name: name.to_string(),
            created_at: now,
            entries,
        };

        let mut presets = self.presets.lock().unwrap();
        presets.retain(|p| p.name != name);
        presets.push(preset.clone());
        self.persist(&presets)?;
        log::info!(
            "[Presets] Captured '{name}' ({} entries)",
            preset.entries.len()
        );
        Ok(preset)
    }

    /// Enable every resolvable entry and apply its stored preferences.
    ///
    /// A missing mod never fails the apply: the entry is flagged
    /// `is_missing`, persisted, and reported as a warning.
    pub async fn apply(&self, name: &str, library: &ModLibrary) -> EngineResult<ApplyPresetResult> {
        let entries = {
            let presets = self.presets.lock().unwrap();
            presets
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| EngineError::PresetNotFound(name.to_string()))?
                .entries
                .clone()
        };

        let mut changed = 0;
        let mut warnings = Vec::new();
        let mut went_missing = Vec::new();

        for entry in &entries {
            let Some(m) = library.get(&entry.mod_id) else {
                let label = entry
                    .custom_name
                    .clone()
                    .unwrap_or_else(|| entry.full_path.clone());
                warnings.push(format!("Skipping missing mod: {label}"));
                went_missing.push(entry.mod_id.clone());
                continue;
            };

            if !m.is_enabled {
                // One entry failing to enable (collision, contended
                // owner) must not abandon the rest of the preset.
                match library.enable(&m.id).await {
                    Ok(_) => changed += 1,
                    Err(e) => {
                        warnings.push(format!("Could not enable {}: {e}", m.display_name()));
                        continue;
                    }
                }
            }
            if !entry.preferences.is_empty() {
                let update = ModSettingsUpdate {
                    preferences: Some(entry.preferences.clone()),
                    ..Default::default()
                };
                if let Err(e) = library.update_settings(&m.id, &update) {
                    warnings.push(format!(
                        "Preferences not applied for {}: {e}",
                        m.display_name()
                    ));
                }
            }
        }

        if !went_missing.is_empty() {
            let mut presets = self.presets.lock().unwrap();
            if let Some(preset) = presets.iter_mut().find(|p| p.name == name) {
                for entry in preset.entries.iter_mut() {
                    if went_missing.contains(&entry.mod_id) {
                        entry.is_missing = true;
                    }
                }
            }
            self.persist(&presets)?;
        }

        log::info!("[Presets] Applied '{name}': {changed} enabled, {} warnings", warnings.len());
        Ok(ApplyPresetResult {
            changed_count: changed,
            warnings,
        })
    }

    pub fn list(&self) -> Vec<Preset> {
        self.presets.lock().unwrap().clone()
    }

    pub fn get(&self, name: &str) -> Option<Preset> {
        self.presets
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    pub fn delete_preset(&self, name: &str) -> EngineResult<()> {
        let mut presets = self.presets.lock().unwrap();
        let before = presets.len();
        presets.retain(|p| p.name != name);
        if presets.len() == before {
            return Err(EngineError::PresetNotFound(name.to_string()));
        }
        self.persist(&presets)?;
        log::info!("[Presets] Deleted '{name}'");
        Ok(())
    }

    /// Which presets reference each of the given mods. Used before a
    /// delete to warn about or clean dangling references.
    pub fn find_presets_referencing(&self, mod_ids: &[String]) -> HashMap<String, Vec<String>> {
        let presets = self.presets.lock().unwrap();
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for id in mod_ids {
            for preset in presets.iter() {
                if preset.entries.iter().any(|e| &e.mod_id == id) {
                    map.entry(id.clone()).or_default().push(preset.name.clone());
                }
            }
        }
        map
    }

    /// Remove a single entry from a preset, typically a dangling
    /// reference left by a deleted mod.
    pub fn delete_entry(&self, preset_name: &str, mod_id: &str) -> EngineResult<()> {
        let mut presets = self.presets.lock().unwrap();
        let preset = presets
            .iter_mut()
            .find(|p| p.name == preset_name)
            .ok_or_else(|| EngineError::PresetNotFound(preset_name.to_string()))?;

        let before = preset.entries.len();
        preset.entries.retain(|e| e.mod_id != mod_id);
        if preset.entries.len() == before {
            return Err(EngineError::ModNotFound(mod_id.to_string()));
        }
        self.persist(&presets)?;
        Ok(())
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn persist(&self, presets: &[Preset]) -> EngineResult<()> {
        let json = serde_json::to_string_pretty(presets)
            .map_err(|e| EngineError::Document(e.to_string()))?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| EngineError::Document(format!("persist presets: {e}")))?;
        Ok(())
    }
}
