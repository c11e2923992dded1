//! rss-poller - adaptive feed poller
//!
//! Polls a set of feed sources on per-source intervals that adapt to how
//! much each source publishes, deduplicates entries against a change cache
//! and routes new or changed items to downstream consumers.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod logging;
pub mod output;
pub mod scheduler;
pub mod source;

pub use cache::{cache_key, ChangeCache, MemoryCache, SqlCache, CACHE_KEY_PREFIX};
pub use config::Config;
pub use db::Database;
pub use error::{PollerError, Result};
pub use feed::{FeedFetcher, HttpFeedFetcher, ParsedFeed, RawEntry};
pub use ingest::{fingerprint, Item, Pipeline, PipelinePolicy};
pub use output::{ItemSink, OutputRouter, Publisher};
pub use scheduler::{LiveHours, Scheduler, SchedulerOptions};
pub use source::{Source, SourceStore, SqlSourceStore};
