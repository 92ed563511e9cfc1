use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One mod captured into a preset. The entry keeps enough context to
/// survive the mod being renamed or deleted later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetEntry {
    pub mod_id: String,
    pub full_path: String,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub preferences: HashMap<String, String>,
    /// Set when an apply could not resolve the mod; persisted so the
    /// user can see and clean dangling references.
    #[serde(default)]
    pub is_missing: bool,
    pub added_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub created_at: String,
    pub entries: Vec<PresetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPresetResult {
    pub changed_count: usize,
    pub warnings: Vec<String>,
}
