//! Fetch/parse/dedup pipeline.
//!
//! One call to [`Pipeline::parse`] turns a source into the items that are new
//! or changed since the last poll:
//!
//! 1. fetch and parse the feed,
//! 2. drop entries outside the publish-date window,
//! 3. build items on concurrent workers (width capped by a semaphore),
//! 4. run the denylist, optional link probe and cache decision in order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

use super::classify::{category, classify, fingerprint, image_enclosure};
use super::filter::{is_allowed_link, PublishedFilter};
use super::item::{decide, CacheDecision, CacheLookup, CachePolicy, Item};
use crate::cache::{cache_key, ChangeCache, CACHE_KEY_PREFIX, DEFAULT_TTL};
use crate::config::{Config, MAX_CACHE_TTL_HOURS};
use crate::feed::{FeedFetcher, RawEntry};
use crate::source::Source;
use crate::{PollerError, Result};

/// Default number of concurrent item workers.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Tunables of a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelinePolicy {
    pub max_workers: usize,
    pub filter: PublishedFilter,
    pub cache_prefix: String,
    pub cache_ttl: Duration,
    pub cache: CachePolicy,
    pub verify_links: bool,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            filter: PublishedFilter::MaxAge(chrono::Duration::hours(72)),
            cache_prefix: CACHE_KEY_PREFIX.to_string(),
            cache_ttl: DEFAULT_TTL,
            cache: CachePolicy::default(),
            verify_links: false,
        }
    }
}

impl PipelinePolicy {
    pub fn from_config(config: &Config) -> Result<Self> {
        let tz: Tz = config.scheduler.timezone.parse().map_err(|_| {
            PollerError::Config(format!("unknown timezone: {}", config.scheduler.timezone))
        })?;

        Ok(Self {
            max_workers: config.pipeline.max_workers.max(1),
            filter: PublishedFilter::from_config(&config.pipeline, tz),
            cache_prefix: config.cache.key_prefix.clone(),
            cache_ttl: Duration::from_secs(
                config.cache.ttl_hours.min(MAX_CACHE_TTL_HOURS) * 3600,
            ),
            cache: CachePolicy {
                refresh_on_change: config.pipeline.refresh_on_change,
                emit_unchanged: config.pipeline.emit_unchanged,
            },
            verify_links: config.pipeline.verify_links,
        })
    }
}

/// Turns a source into new and changed items.
pub struct Pipeline {
    fetcher: Arc<dyn FeedFetcher>,
    cache: Arc<dyn ChangeCache>,
    policy: PipelinePolicy,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        cache: Arc<dyn ChangeCache>,
        policy: PipelinePolicy,
    ) -> Self {
        Self {
            fetcher,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Poll a source once and return its new or changed items in feed order.
    ///
    /// A fetch or parse failure is returned as an error. Per-item cache
    /// failures only drop the affected item.
    pub async fn parse(&self, source: &Source) -> Result<Vec<Item>> {
        let feed = match self.fetcher.fetch(&source.url).await {
            Ok(feed) => feed,
            Err(e) => {
                self.log_diagnostic(source).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let total = feed.items.len();
        let entries: Vec<RawEntry> = feed
            .items
            .into_iter()
            .filter(|entry| self.policy.filter.keep(entry.published, now))
            .collect();
        debug!(
            source_id = source.id,
            "{} of {} entries within the publish window",
            entries.len(),
            total
        );

        let built = self.build_items(entries, &source.name, now).await;

        let mut items = Vec::with_capacity(built.len());
        for item in built {
            if let Some(item) = self.admit(item).await {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Drop expired change-cache entries.
    pub async fn purge_cache(&self) {
        match self.cache.purge_expired().await {
            Ok(0) => {}
            Ok(n) => debug!("Purged {} expired cache entries", n),
            Err(e) => warn!("Cache purge failed: {}", e),
        }
    }

    async fn log_diagnostic(&self, source: &Source) {
        match self.fetcher.diagnose(&source.url).await {
            Ok(sample) => warn!(
                source_id = source.id,
                url = %source.url,
                "Unparseable feed body: {}",
                sample
            ),
            Err(e) => debug!("Diagnostic fetch of {} failed: {}", source.url, e),
        }
    }

    /// Build items concurrently. Returns once every worker has finished.
    async fn build_items(
        &self,
        entries: Vec<RawEntry>,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> Vec<Item> {
        let semaphore = Arc::new(Semaphore::new(self.policy.max_workers.max(1)));
        let (tx, mut rx) = mpsc::channel::<(usize, Item)>(entries.len().max(1));
        let mut workers = Vec::with_capacity(entries.len());

        for (index, entry) in entries.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let tx = tx.clone();
            let name = source_name.to_string();
            workers.push(tokio::spawn(async move {
                let _permit = permit;
                let item = build_item(entry, &name, now);
                let _ = tx.send((index, item)).await;
            }));
        }
        // The channel closes once the last worker drops its sender.
        drop(tx);

        let mut built = Vec::with_capacity(workers.len());
        while let Some(pair) = rx.recv().await {
            built.push(pair);
        }

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Item worker failed: {}", e);
            }
        }

        built.sort_by_key(|(index, _)| *index);
        built.into_iter().map(|(_, item)| item).collect()
    }

    /// Run the sequential checks on one item.
    async fn admit(&self, mut item: Item) -> Option<Item> {
        if !is_allowed_link(&item.link) {
            debug!("Skipping denylisted link {}", item.link);
            return None;
        }

        if self.policy.verify_links && !self.fetcher.check_link(&item.link).await {
            debug!("Skipping unreachable link {}", item.link);
            return None;
        }

        let key = cache_key(&self.policy.cache_prefix, &item.fingerprint);
        let lookup = self.cache.exists(&key).await;
        if let Err(e) = &lookup {
            warn!("Cache lookup failed for {}: {}", item.link, e);
        }

        match decide(
            CacheLookup::from_result(&lookup),
            &item.full_text,
            self.policy.cache,
        ) {
            CacheDecision::Insert => {
                if let Err(e) = self
                    .cache
                    .set(&key, &item.full_text, self.policy.cache_ttl)
                    .await
                {
                    warn!("Cache write failed for {}: {}", item.link, e);
                    return None;
                }
                Some(item)
            }
            CacheDecision::Unchanged { emit } => emit.then_some(item),
            CacheDecision::Changed { refresh } => {
                if refresh {
                    if let Err(e) = self
                        .cache
                        .set(&key, &item.full_text, self.policy.cache_ttl)
                        .await
                    {
                        warn!("Cache refresh failed for {}: {}", item.link, e);
                    }
                }
                item.changed = true;
                Some(item)
            }
            CacheDecision::Skip => None,
        }
    }
}

fn build_item(entry: RawEntry, source_name: &str, now: DateTime<Utc>) -> Item {
    let fingerprint = fingerprint(&entry);
    let (full_text, has_full_text) = classify(&entry);

    Item {
        title: entry.title.trim().to_string(),
        description: entry.description.trim().to_string(),
        full_text: full_text.trim().to_string(),
        link: entry.link.as_deref().unwrap_or_default().trim().to_string(),
        name: source_name.trim().to_string(),
        category: category(&entry),
        enclosure: image_enclosure(&entry),
        pub_date: entry.published.unwrap_or(now),
        fingerprint,
        has_full_text,
        changed: false,
    }
}
