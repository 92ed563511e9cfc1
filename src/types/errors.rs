use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cache I/O error: {0}")]
    CacheIo(String),
    #[error("Hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch { declared: String, computed: String },
    #[error("Invalid archive name format: {0}")]
    InvalidArchiveNameFormat(String),
    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),
    #[error("Name collision: '{name}' already exists under '{owner}'")]
    NameCollision { owner: String, name: String },
    #[error("No settings document for mod {0}")]
    SettingsNotFound(String),
    #[error("Malformed document: {0}")]
    Document(String),
    #[error("Mod not found: {0}")]
    ModNotFound(String),
    #[error("Preset not found: {0}")]
    PresetNotFound(String),
    #[error("Command not found: {0}")]
    CommandNotFound(String),
    #[error("Run not running: {0}")]
    NotRunning(String),
    #[error("Operation canceled")]
    Canceled,
    #[error("Operation in progress: {0}")]
    Busy(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

impl EngineError {
    /// True for errors a batch caller should record and move past
    /// rather than abort on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, EngineError::Canceled)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
