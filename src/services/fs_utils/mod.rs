//! Shared filesystem helpers for the library, cache and trash services.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::types::errors::{EngineError, EngineResult};

#[cfg(test)]
#[path = "tests/fs_utils_tests.rs"]
mod tests;

/// Move a file or directory, falling back to a copy-and-remove when
/// `fs::rename` fails across mount points.
pub fn move_path(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::warn!(
                "[FsUtils] rename {} -> {} failed ({}), trying copy fallback",
                from.display(),
                to.display(),
                e
            );

            if !from.exists() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "move source does not exist",
                ));
            }
            if to.exists() {
                // Keep the original error (e.g. AlreadyExists).
                return Err(e);
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }

            if from.is_dir() {
                let mut options = fs_extra::dir::CopyOptions::new();
                options.copy_inside = false;
                fs_extra::dir::move_dir(from, to, &options)
                    .map(|_| ())
                    .map_err(|err| std::io::Error::other(err.to_string()))
            } else {
                let options = fs_extra::file::CopyOptions::new();
                fs_extra::file::move_file(from, to, &options)
                    .map(|_| ())
                    .map_err(|err| std::io::Error::other(err.to_string()))
            }
        }
    }
}

/// First free variant of `dest`: the path itself, or `name (2)`,
/// `name (3)`, ... when it is taken.
pub fn unique_destination(dest: PathBuf) -> PathBuf {
    if !dest.exists() {
        return dest;
    }
    let base = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "mod".to_string());
    let parent = dest.parent().unwrap_or(Path::new(".")).to_path_buf();
    let mut n = 2u32;
    loop {
        let candidate = parent.join(format!("{base} ({n})"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Reject candidates that resolve outside `base` (absolute paths that do
/// not start with it, or relative paths escaping through `..`).
pub fn ensure_within(base: &Path, candidate: &Path) -> EngineResult<PathBuf> {
    if candidate.is_absolute() {
        if candidate.starts_with(base) {
            return Ok(candidate.to_path_buf());
        }
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "path escapes managed directory bounds",
        )));
    }

    let mut depth: i32 = 0;
    for component in candidate.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(EngineError::Io(std::io::Error::new(
                        std::io::ErrorKind::PermissionDenied,
                        "path escapes managed directory bounds",
                    )));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(EngineError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "path escapes managed directory bounds",
                )));
            }
        }
    }
    Ok(base.join(candidate))
}

/// Total size in bytes of every file under `path`.
pub fn dir_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
