//! Sidecar document lifecycle for mod folders.
//!
//! Every mod folder may carry a `.skinvault.json` holding its stable
//! identity, installer metadata and user settings. Reads go through a
//! small LRU cache validated against the file's mtime, so external edits
//! are picked up without re-parsing on every call.

use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex as StdMutex;
use std::time::SystemTime;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::errors::{EngineError, EngineResult};

pub const SETTINGS_FILE: &str = ".skinvault.json";

/// Parsed documents kept hot per mod id.
const SETTINGS_CACHE_CAP: usize = 500;

/// The sidecar document. `settings` stays `None` until the user first
/// configures the mod, which is how "never configured" is distinguished
/// from a corrupt file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModDocument {
    pub id: String,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub settings: Option<ModSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModSettings {
    #[serde(default)]
    pub preferences: HashMap<String, String>,
    #[serde(default)]
    pub character_skin_override: Option<String>,
}

/// Explicit per-field update: a field is applied exactly when it is set
/// here. "Did anything change" is a plain reduction over this list, not
/// runtime introspection.
#[derive(Debug, Clone, Default)]
pub struct ModSettingsUpdate {
    pub custom_name: Option<String>,
    pub source_url: Option<String>,
    pub character_skin_override: Option<String>,
    pub preferences: Option<HashMap<String, String>>,
}

impl ModSettingsUpdate {
    pub fn any_set(&self) -> bool {
        self.custom_name.is_some()
            || self.source_url.is_some()
            || self.character_skin_override.is_some()
            || self.preferences.is_some()
    }
}

/// Read and parse the sidecar document from a mod folder.
///
/// `Ok(None)` when the file does not exist; `Document` when it exists but
/// cannot be parsed.
pub fn read_document(mod_path: &Path) -> EngineResult<Option<ModDocument>> {
    let doc_path = mod_path.join(SETTINGS_FILE);
    if !doc_path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&doc_path)?;
    let doc: ModDocument = serde_json::from_str(&raw)
        .map_err(|e| EngineError::Document(format!("{}: {e}", doc_path.display())))?;
    Ok(Some(doc))
}

pub fn write_document(mod_path: &Path, doc: &ModDocument) -> EngineResult<()> {
    let doc_path = mod_path.join(SETTINGS_FILE);
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| EngineError::Document(e.to_string()))?;
    fs::write(&doc_path, json)?;
    Ok(())
}

/// Identity of the folder, creating a minimal document with a fresh UUID
/// when none exists yet.
pub fn ensure_identity(mod_path: &Path) -> EngineResult<String> {
    if let Some(doc) = read_document(mod_path)? {
        if !doc.id.is_empty() {
            return Ok(doc.id);
        }
    }
    let id = Uuid::new_v4().to_string();
    let doc = ModDocument {
        id: id.clone(),
        custom_name: None,
        source_url: None,
        settings: None,
    };
    write_document(mod_path, &doc)?;
    Ok(id)
}

/// Merge an update into the document, creating document and settings
/// lazily on first write.
pub fn update_document(
    mod_path: &Path,
    mod_id: &str,
    update: &ModSettingsUpdate,
) -> EngineResult<ModDocument> {
    let mut doc = read_document(mod_path)?.unwrap_or(ModDocument {
        id: mod_id.to_string(),
        custom_name: None,
        source_url: None,
        settings: None,
    });

    if !update.any_set() {
        return Ok(doc);
    }

    if let Some(name) = &update.custom_name {
        doc.custom_name = Some(name.clone());
    }
    if let Some(url) = &update.source_url {
        doc.source_url = Some(url.clone());
    }
    if update.character_skin_override.is_some() || update.preferences.is_some() {
        let settings = doc.settings.get_or_insert_with(ModSettings::default);
        if let Some(skin) = &update.character_skin_override {
            settings.character_skin_override = Some(skin.clone());
        }
        if let Some(prefs) = &update.preferences {
            settings.preferences.extend(prefs.clone());
        }
    }

    write_document(mod_path, &doc)?;
    Ok(doc)
}

struct CachedDoc {
    doc: ModDocument,
    mtime: SystemTime,
}

/// Mtime-validated L1 over parsed sidecar documents, keyed by mod id.
pub struct SettingsCache {
    entries: StdMutex<LruCache<String, CachedDoc>>,
}

impl SettingsCache {
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(LruCache::new(
                NonZeroUsize::new(SETTINGS_CACHE_CAP).unwrap(),
            )),
        }
    }

    pub fn read(&self, mod_id: &str, mod_path: &Path) -> EngineResult<Option<ModDocument>> {
        let doc_path = mod_path.join(SETTINGS_FILE);
        let Ok(meta) = fs::metadata(&doc_path) else {
            self.invalidate(mod_id);
            return Ok(None);
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        {
            let mut cache = self.entries.lock().unwrap();
            if let Some(hit) = cache.get(mod_id) {
                if hit.mtime == mtime {
                    return Ok(Some(hit.doc.clone()));
                }
                cache.pop(mod_id);
            }
        }

        let doc = read_document(mod_path)?;
        if let Some(doc) = &doc {
            let mut cache = self.entries.lock().unwrap();
            cache.put(
                mod_id.to_string(),
                CachedDoc {
                    doc: doc.clone(),
                    mtime,
                },
            );
        }
        Ok(doc)
    }

    pub fn invalidate(&self, mod_id: &str) {
        self.entries.lock().unwrap().pop(mod_id);
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::new()
    }
}
