//! Ingest: from a feed source to deduplicated items.

mod classify;
mod filter;
mod item;
mod pipeline;

pub use classify::{
    category, classify, extract_full_text, fingerprint, image_enclosure, FALLBACK_NOTICE,
};
pub use filter::{is_allowed_link, PublishedFilter, LINK_DENYLIST};
pub use item::{decide, CacheDecision, CacheLookup, CachePolicy, Item};
pub use pipeline::{Pipeline, PipelinePolicy, DEFAULT_MAX_WORKERS};
