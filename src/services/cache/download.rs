//! Streaming download of a remote archive into the cache.
//!
//! The remote catalog client (out of scope here) supplies the URL and the
//! declared content hash; this module fetches the bytes and admits them
//! through the normal cache path, so dedup, verification and eviction all
//! apply.

use std::io::Write;
use std::path::PathBuf;

use futures_util::StreamExt;

use super::archive_cache::ArchiveCache;
use crate::types::errors::{EngineError, EngineResult};

/// Resolve `(url, declared_hash)` to a cached archive path. Short-circuits
/// on a cache hit without touching the network. The body is streamed to a
/// temp file in the cache root and hashed as it arrives, so memory use
/// stays flat regardless of archive size.
pub async fn download_to_cache(
    cache: &ArchiveCache,
    client: &reqwest::Client,
    url: &str,
    declared_hash: &str,
) -> EngineResult<PathBuf> {
    if let Some(path) = cache.try_get_by_hash(declared_hash) {
        log::debug!("[Cache] Download skipped, {declared_hash} already cached");
        return Ok(path);
    }

    log::info!("[Cache] Downloading {url}");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::CacheIo(format!("download request failed: {e}")))?
        .error_for_status()
        .map_err(|e| EngineError::CacheIo(format!("download failed: {e}")))?;

    let mut tmp = cache.staging_file()?;
    let mut hasher = blake3::Hasher::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| EngineError::CacheIo(format!("download stream: {e}")))?;
        hasher.update(&chunk);
        tmp.as_file_mut()
            .write_all(&chunk)
            .map_err(|e| EngineError::CacheIo(format!("download write: {e}")))?;
    }
    let computed = hasher.finalize().to_hex().to_string();

    cache.put_from_file(tmp, declared_hash, &computed).await
}
