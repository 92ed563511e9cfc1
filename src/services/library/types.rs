use std::path::PathBuf;

use serde::Serialize;

use super::display_name;

/// One installed mod: a directory under its owning object, with a stable
/// identity independent of its current name and location.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModFolder {
    pub id: String,
    pub owner: String,
    pub path: PathBuf,
    pub is_enabled: bool,
}

impl ModFolder {
    pub fn folder_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Folder name without the disabled marker.
    pub fn display_name(&self) -> String {
        display_name(&self.folder_name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkActionError {
    pub id: String,
    pub error: String,
}

/// Combined report for batch operations: batches never abort on a single
/// item's failure.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BulkResult {
    pub success: Vec<String>,
    pub failures: Vec<BulkActionError>,
}

impl BulkResult {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}
