//! Change-detection cache.
//!
//! Maps an item fingerprint to the full text last seen for it, with a TTL.
//! The pipeline uses it to tell new, changed and already-known items apart.

mod memory;
mod sql;

pub use memory::MemoryCache;
pub use sql::{SeenItemRepository, SqlCache};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{CacheBackend, CacheConfig};
use crate::db::Database;
use crate::Result;

/// Default namespace prepended to every fingerprint.
pub const CACHE_KEY_PREFIX: &str = "rss:item:";

/// Default time-to-live of a cache entry (72 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(72 * 60 * 60);

/// Key-value store with per-entry expiry.
#[async_trait]
pub trait ChangeCache: Send + Sync {
    /// Look up a key. `Ok(None)` when absent or expired.
    async fn exists(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, overwriting any previous one.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Drop expired entries and return how many were removed.
    async fn purge_expired(&self) -> Result<u64> {
        Ok(0)
    }
}

/// Build the cache key of a fingerprint.
pub fn cache_key(prefix: &str, fingerprint: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + fingerprint.len());
    key.push_str(prefix);
    key.push_str(fingerprint);
    key
}

/// Create the configured cache backend.
pub fn build(config: &CacheConfig, db: &Database) -> Arc<dyn ChangeCache> {
    let cache: Arc<dyn ChangeCache> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Database => Arc::new(SqlCache::new(db.clone())),
    };
    cache
}
