//! Remote-archive naming convention.
//!
//! Archive names carry exactly four fields joined by `_!!_`: the
//! human-readable mod name, the remote source id, the remote file id, and
//! the true file extension of the payload. Any other field count is fatal
//! during staging.

use crate::types::errors::{EngineError, EngineResult};

pub const FIELD_SEPARATOR: &str = "_!!_";
const FIELD_COUNT: usize = 4;

/// Supported archive payload formats, selected by the trailing name field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZ,
}

impl ArchiveFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// Display name of the mod, sanitized for use as a folder name.
    pub mod_name: String,
    pub source_id: String,
    pub file_id: String,
    pub format: ArchiveFormat,
}

/// Parse a four-field archive name.
///
/// The separator token never appears in legitimate field content, so a
/// plain split is exact.
pub fn parse(raw: &str) -> EngineResult<ArchiveName> {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT {
        return Err(EngineError::InvalidArchiveNameFormat(format!(
            "expected {FIELD_COUNT} fields, got {}: '{raw}'",
            fields.len()
        )));
    }

    let mod_name = sanitize_filename::sanitize(fields[0].trim());
    if mod_name.is_empty() {
        return Err(EngineError::InvalidArchiveNameFormat(format!(
            "empty mod name field: '{raw}'"
        )));
    }

    let format = ArchiveFormat::from_extension(fields[3])
        .ok_or_else(|| EngineError::UnsupportedArchive(fields[3].to_string()))?;

    Ok(ArchiveName {
        mod_name,
        source_id: fields[1].to_string(),
        file_id: fields[2].to_string(),
        format,
    })
}
