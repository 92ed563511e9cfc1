use super::archive_cache::{hash_bytes, ArchiveCache};
use crate::types::errors::EngineError;
use filetime::FileTime;
use std::fs;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const MIB: u64 = 1024 * 1024;

fn payload(fill: u8, len: usize) -> Vec<u8> {
    vec![fill; len]
}

#[tokio::test]
async fn test_put_then_get_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let data = payload(7, 4096);
    let hash = hash_bytes(&data);
    let path = cache.put(data.clone(), &hash).await.unwrap();

    let resolved = cache.try_get_by_hash(&hash).unwrap();
    assert_eq!(resolved, path);
    assert_eq!(fs::read(&resolved).unwrap(), data);
}

#[tokio::test]
async fn test_put_dedups_existing_hash() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let data = payload(1, 1024);
    let hash = hash_bytes(&data);
    let first = cache.put(data.clone(), &hash).await.unwrap();
    let second = cache.put(data, &hash).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn test_put_rejects_hash_mismatch() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let result = cache.put(payload(2, 256), "deadbeef").await;
    assert!(matches!(result, Err(EngineError::HashMismatch { .. })));
    // A failed put must not leave a visible entry behind.
    assert_eq!(cache.total_size(), 0);
}

#[tokio::test]
async fn test_completed_write_locks_are_shed() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    for fill in [1u8, 2, 3] {
        let data = payload(fill, 256);
        let hash = hash_bytes(&data);
        cache.put(data, &hash).await.unwrap();
    }

    // Each finished put releases its per-hash lock; the next write
    // sheds the idle ones instead of accumulating one per hash ever.
    let data = payload(4, 256);
    let hash = hash_bytes(&data);
    cache.put(data, &hash).await.unwrap();
    assert_eq!(cache.tracked_write_locks(), 1);
}

#[tokio::test]
async fn test_put_from_file_admits_streamed_payload() {
    use std::io::Write;

    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    // Write in chunks, hashing incrementally, the way a download does.
    let data = payload(9, 8192);
    let mut staging = cache.staging_file().unwrap();
    let mut hasher = blake3::Hasher::new();
    for chunk in data.chunks(1024) {
        hasher.update(chunk);
        staging.as_file_mut().write_all(chunk).unwrap();
    }
    let hash = hasher.finalize().to_hex().to_string();

    let path = cache.put_from_file(staging, &hash, &hash).await.unwrap();
    assert_eq!(fs::read(&path).unwrap(), data);
    assert_eq!(cache.total_size(), data.len() as u64);
    assert_eq!(cache.try_get_by_hash(&hash), Some(path));
}

#[tokio::test]
async fn test_put_from_file_rejects_mismatch_and_leaves_no_file() {
    use std::io::Write;

    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let mut staging = cache.staging_file().unwrap();
    staging.as_file_mut().write_all(&payload(3, 512)).unwrap();
    let computed = hash_bytes(&payload(3, 512));

    let result = cache.put_from_file(staging, "deadbeef", &computed).await;
    assert!(matches!(result, Err(EngineError::HashMismatch { .. })));
    assert_eq!(cache.total_size(), 0);
    // The rejected temp file must not linger in the cache root.
    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_quota_evicts_least_recently_used() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let a = payload(b'a', 4 * MIB as usize);
    let b = payload(b'b', 4 * MIB as usize);
    let c = payload(b'c', 4 * MIB as usize);
    let (ha, hb, hc) = (hash_bytes(&a), hash_bytes(&b), hash_bytes(&c));

    cache.put(a, &ha).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(b, &hb).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(c, &hc).await.unwrap();

    // A was least recently accessed: 12 MiB > 10 MiB evicts exactly it.
    assert!(cache.try_get_by_hash(&ha).is_none());
    assert!(cache.try_get_by_hash(&hb).is_some());
    assert!(cache.try_get_by_hash(&hc).is_some());
    assert!(cache.total_size() <= 10 * MIB);
}

#[tokio::test]
async fn test_get_refreshes_eviction_order() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let a = payload(b'a', 4 * MIB as usize);
    let b = payload(b'b', 4 * MIB as usize);
    let c = payload(b'c', 4 * MIB as usize);
    let (ha, hb, hc) = (hash_bytes(&a), hash_bytes(&b), hash_bytes(&c));

    cache.put(a, &ha).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(b, &hb).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Touch A so B becomes the oldest.
    cache.try_get_by_hash(&ha).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(c, &hc).await.unwrap();

    assert!(cache.try_get_by_hash(&ha).is_some());
    assert!(cache.try_get_by_hash(&hb).is_none());
}

#[tokio::test]
async fn test_pin_defers_eviction_until_drop() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let a = payload(b'a', 4 * MIB as usize);
    let b = payload(b'b', 4 * MIB as usize);
    let c = payload(b'c', 4 * MIB as usize);
    let (ha, hb, hc) = (hash_bytes(&a), hash_bytes(&b), hash_bytes(&c));

    cache.put(a, &ha).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(b, &hb).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let pin = cache.pin(&ha).unwrap();
    cache.put(c, &hc).await.unwrap();

    // A is the LRU victim but pinned, so B went instead.
    assert!(cache.contains(&ha));
    assert!(!cache.contains(&hb));

    // Over-quota state resolves once the pin drops.
    drop(pin);
    assert!(!cache.contains(&ha) || cache.total_size() <= 10 * MIB);
}

#[tokio::test]
async fn test_set_quota_triggers_eviction() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 10 * MIB).unwrap();

    let a = payload(b'a', 4 * MIB as usize);
    let b = payload(b'b', 4 * MIB as usize);
    let (ha, hb) = (hash_bytes(&a), hash_bytes(&b));
    cache.put(a, &ha).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.put(b, &hb).await.unwrap();

    cache.set_quota(5 * MIB);
    assert!(!cache.contains(&ha));
    assert!(cache.contains(&hb));
}

#[tokio::test]
async fn test_open_rebuilds_index_and_respects_mtime_order() {
    let tmp = TempDir::new().unwrap();
    {
        let cache = ArchiveCache::open(tmp.path(), 100 * MIB).unwrap();
        let a = payload(b'a', 4 * MIB as usize);
        let b = payload(b'b', 4 * MIB as usize);
        cache.put(a.clone(), &hash_bytes(&a)).await.unwrap();
        cache.put(b.clone(), &hash_bytes(&b)).await.unwrap();
    }

    // Backdate A so it is the clear LRU victim after reopen.
    let a = payload(b'a', 4 * MIB as usize);
    let (ha, hb) = (
        hash_bytes(&a),
        hash_bytes(&payload(b'b', 4 * MIB as usize)),
    );
    let old = SystemTime::now() - Duration::from_secs(3600);
    filetime::set_file_mtime(tmp.path().join(&ha), FileTime::from_system_time(old)).unwrap();

    let reopened = ArchiveCache::open(tmp.path(), 5 * MIB).unwrap();
    assert!(!reopened.contains(&ha));
    assert!(reopened.contains(&hb));
}

#[tokio::test]
async fn test_clear_removes_unpinned_entries() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 100 * MIB).unwrap();

    let a = payload(b'a', 1024);
    let b = payload(b'b', 1024);
    let (ha, hb) = (hash_bytes(&a), hash_bytes(&b));
    cache.put(a, &ha).await.unwrap();
    cache.put(b, &hb).await.unwrap();

    let _pin = cache.pin(&ha).unwrap();
    let removed = cache.clear().unwrap();
    assert_eq!(removed, 1);
    assert!(cache.contains(&ha));
    assert!(!cache.contains(&hb));
}

#[tokio::test]
async fn test_concurrent_puts_single_write() {
    let tmp = TempDir::new().unwrap();
    let cache = ArchiveCache::open(tmp.path(), 100 * MIB).unwrap();

    let data = payload(9, 64 * 1024);
    let hash = hash_bytes(&data);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let data = data.clone();
        let hash = hash.clone();
        handles.push(tokio::spawn(async move { cache.put(data, &hash).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
}
