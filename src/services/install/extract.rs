//! Archive extraction into a staging directory.

use std::fs;
use std::io;
use std::path::Path;

use super::archive_name::ArchiveFormat;
use crate::services::fs_utils;
use crate::types::errors::{EngineError, EngineResult};

/// Headroom required beyond the estimated uncompressed size.
const DISK_SPACE_BUFFER: u64 = 50 * 1024 * 1024;

/// Extract `archive_path` into `dest_dir`, returning the number of files
/// written. Entries with unsafe paths (absolute or escaping the
/// destination) are skipped. A single wrapper folder around the real
/// content is flattened away afterwards.
pub fn extract_archive(
    format: ArchiveFormat,
    archive_path: &Path,
    dest_dir: &Path,
) -> EngineResult<usize> {
    check_disk_space(archive_path, dest_dir, format)?;
    fs::create_dir_all(dest_dir)?;

    let count = match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir)?,
        ArchiveFormat::SevenZ => extract_7z(archive_path, dest_dir)?,
    };

    if let Err(e) = flatten_if_needed(dest_dir) {
        log::warn!("[Install] Wrapper flattening failed (non-fatal): {e}");
    }

    Ok(count)
}

/// Refuse to extract onto a disk that cannot hold the uncompressed tree.
/// When the mount point cannot be resolved the check is skipped rather
/// than failing the install.
fn check_disk_space(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
) -> EngineResult<()> {
    let required = estimate_uncompressed_size(archive_path, format)? + DISK_SPACE_BUFFER;

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let search_path = dest_dir
        .canonicalize()
        .unwrap_or_else(|_| dest_dir.to_path_buf());

    let mut available = 0;
    let mut matched_len = 0;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if search_path.starts_with(mount) && mount.as_os_str().len() > matched_len {
            matched_len = mount.as_os_str().len();
            available = disk.available_space();
        }
    }

    if matched_len > 0 && available < required {
        return Err(EngineError::CacheIo(format!(
            "insufficient disk space: requires {required} bytes, {available} available"
        )));
    }
    Ok(())
}

fn estimate_uncompressed_size(archive_path: &Path, format: ArchiveFormat) -> EngineResult<u64> {
    match format {
        ArchiveFormat::Zip => {
            let file = fs::File::open(archive_path)?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| EngineError::UnsupportedArchive(format!("corrupt zip: {e}")))?;
            let mut total = 0u64;
            for i in 0..archive.len() {
                if let Ok(entry) = archive.by_index_raw(i) {
                    total += entry.size();
                }
            }
            Ok(total)
        }
        // 7z headers do not expose sizes cheaply; the compressed size is
        // a usable lower bound.
        ArchiveFormat::SevenZ => Ok(fs::metadata(archive_path)?.len()),
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> EngineResult<usize> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| EngineError::UnsupportedArchive(format!("corrupt zip: {e}")))?;

    let mut count = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| EngineError::UnsupportedArchive(format!("bad zip entry {i}: {e}")))?;

        let entry_path = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                log::warn!("[Install] Skipping unsafe zip entry: {}", entry.name());
                continue;
            }
        };
        let output_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&output_path)?;
        } else {
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&output_path)?;
            io::copy(&mut entry, &mut outfile)?;
            count += 1;
        }
    }
    Ok(count)
}

fn extract_7z(archive_path: &Path, dest_dir: &Path) -> EngineResult<usize> {
    sevenz_rust::decompress_file(archive_path, dest_dir)
        .map_err(|e| EngineError::UnsupportedArchive(format!("failed to extract 7z: {e}")))?;

    let count = walkdir::WalkDir::new(dest_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .count();
    Ok(count)
}

/// If the extracted tree is a single directory wrapping the real content,
/// hoist the children up one level and drop the wrapper.
pub fn flatten_if_needed(dest_dir: &Path) -> EngineResult<()> {
    let entries: Vec<_> = fs::read_dir(dest_dir)?.flatten().collect();
    if entries.len() != 1 || !entries[0].path().is_dir() {
        return Ok(());
    }

    let wrapper = entries[0].path();
    for child in fs::read_dir(&wrapper)?.flatten() {
        let target = dest_dir.join(child.file_name());
        if target.exists() {
            log::warn!(
                "[Install] Skip flatten: {} already exists",
                child.file_name().to_string_lossy()
            );
            continue;
        }
        fs_utils::move_path(&child.path(), &target)?;
    }

    if fs::read_dir(&wrapper)?.next().is_none() {
        let _ = fs::remove_dir(&wrapper);
    }
    Ok(())
}
