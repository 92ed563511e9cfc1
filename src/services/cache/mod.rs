pub mod archive_cache;
pub mod download;

pub use archive_cache::{ArchiveCache, CachePin};

#[cfg(test)]
#[path = "tests/archive_cache_tests.rs"]
mod archive_cache_tests;
