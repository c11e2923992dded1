//! In-process cache backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::ChangeCache;
use crate::{PollerError, Result};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// [`ChangeCache`] kept in a map behind a read-write lock.
///
/// Expired entries are invisible to `exists` and removed by `purge_expired`.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ChangeCache for MemoryCache {
    async fn exists(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| PollerError::Cache(format!("ttl out of range: {:?}", ttl)))?;
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_absent_key() {
        let cache = MemoryCache::new();
        assert_eq!(cache.exists("rss:item:missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_exists() {
        let cache = MemoryCache::new();
        cache.set("k", "body", TTL).await.unwrap();
        assert_eq!(cache.exists("k").await.unwrap(), Some("body".to_string()));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = MemoryCache::new();
        cache.set("k", "old", TTL).await.unwrap();
        cache.set("k", "new", TTL).await.unwrap();
        assert_eq!(cache.exists("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "body", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.exists("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.exists("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_rejected() {
        let cache = MemoryCache::new();
        let result = cache.set("k", "body", Duration::MAX).await;
        assert!(matches!(result, Err(PollerError::Cache(_))));
        assert!(cache.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("short", "a", Duration::from_secs(10)).await.unwrap();
        cache.set("long", "b", TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.exists("long").await.unwrap().is_some());
    }
}
