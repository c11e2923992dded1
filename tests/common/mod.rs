//! Test helpers for integration tests.
//!
//! In-memory stand-ins for the source store, feed fetcher and change cache.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rss_poller::cache::{ChangeCache, MemoryCache};
use rss_poller::feed::{FeedFetcher, ParsedFeed, RawEntry};
use rss_poller::ingest::{Pipeline, PipelinePolicy};
use rss_poller::source::{Source, SourceStore};
use rss_poller::{PollerError, Result};

/// Source store backed by a vector.
#[derive(Default)]
pub struct MockStore {
    sources: Mutex<Vec<Source>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pub interval_updates: Mutex<Vec<(i64, i64)>>,
    pub last_reads: Mutex<Vec<i64>>,
}

impl MockStore {
    pub fn with_sources(sources: Vec<Source>) -> Arc<Self> {
        let store = Self::default();
        *store.sources.lock().unwrap() = sources;
        Arc::new(store)
    }

    pub fn set_sources(&self, sources: Vec<Source>) {
        *self.sources.lock().unwrap() = sources;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `change_update_interval` fail without touching the stored rows.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stored_interval(&self, id: i64) -> Option<i64> {
        self.sources
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.update_interval)
    }

    pub fn last_read_ids(&self) -> Vec<i64> {
        self.last_reads.lock().unwrap().clone()
    }

    pub fn interval_updates(&self) -> Vec<(i64, i64)> {
        self.interval_updates.lock().unwrap().clone()
    }

    pub fn last_read_count(&self) -> usize {
        self.last_reads.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceStore for MockStore {
    async fn get_sources(&self) -> Result<Vec<Source>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PollerError::Database("connection reset".into()));
        }
        Ok(self.sources.lock().unwrap().clone())
    }

    async fn change_update_interval(&self, id: i64, secs: i64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PollerError::Database("database is locked".into()));
        }
        self.interval_updates.lock().unwrap().push((id, secs));
        for source in self.sources.lock().unwrap().iter_mut() {
            if source.id == id {
                source.update_interval = secs;
            }
        }
        Ok(())
    }

    async fn set_last_read(&self, id: i64, _at: DateTime<Utc>) -> Result<()> {
        self.last_reads.lock().unwrap().push(id);
        Ok(())
    }
}

/// Fetcher serving canned entries per URL.
#[derive(Default)]
pub struct MockFetcher {
    feeds: Mutex<HashMap<String, Vec<RawEntry>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, entries: Vec<RawEntry>) {
        self.feeds.lock().unwrap().insert(url.to_string(), entries);
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if self.failing.lock().unwrap().contains(url) {
            return Err(PollerError::Feed(format!("failed to fetch feed: {url}")));
        }
        let items = self
            .feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default();
        Ok(ParsedFeed {
            title: url.to_string(),
            items,
        })
    }

    async fn diagnose(&self, _url: &str) -> Result<String> {
        Ok("HTTP 200 OK: <html></html>".into())
    }

    async fn check_link(&self, _url: &str) -> bool {
        true
    }
}

/// Memory cache that records lookups and can be told to fail them.
#[derive(Default)]
pub struct SpyCache {
    inner: MemoryCache,
    fail_lookups: AtomicBool,
    pub lookups: Mutex<Vec<String>>,
}

impl SpyCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeCache for SpyCache {
    async fn exists(&self, key: &str) -> Result<Option<String>> {
        self.lookups.lock().unwrap().push(key.to_string());
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(PollerError::Cache("connection refused".into()));
        }
        self.inner.exists(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }
}

/// A recent entry with full text.
pub fn entry(guid: &str, link: &str) -> RawEntry {
    RawEntry {
        guid: Some(guid.to_string()),
        link: Some(link.to_string()),
        title: format!("Title {guid}"),
        description: format!("Summary {guid}"),
        content: Some(format!("<p>Body {guid}</p>")),
        published: Some(Utc::now() - chrono::Duration::minutes(30)),
        ..Default::default()
    }
}

pub fn source(id: i64, url: &str) -> Source {
    Source::new(id, format!("Source {id}"), url, 30)
}

pub fn pipeline(fetcher: Arc<MockFetcher>, cache: Arc<dyn ChangeCache>) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(fetcher, cache, PipelinePolicy::default()))
}

/// Yield to other tasks until `cond` holds. Returns whether it did.
pub async fn eventually<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..10_000 {
        if cond() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    cond()
}
