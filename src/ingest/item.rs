//! Items produced by the pipeline and the cache decision that gates them.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A new or changed entry ready for the output router.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub title: String,
    pub description: String,
    /// Full text, or the description with a notice when none was published.
    pub full_text: String,
    pub link: String,
    /// Name of the source the item came from.
    pub name: String,
    pub category: String,
    /// Image URL, possibly empty.
    pub enclosure: String,
    pub pub_date: DateTime<Utc>,
    pub fingerprint: String,
    pub has_full_text: bool,
    /// Set when the cached text for this fingerprint differed.
    pub changed: bool,
}

/// Result of looking an item up in the change cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup<'a> {
    Absent,
    Present(&'a str),
    Failed,
}

impl<'a> CacheLookup<'a> {
    pub fn from_result<E>(result: &'a Result<Option<String>, E>) -> Self {
        match result {
            Ok(None) => Self::Absent,
            Ok(Some(cached)) => Self::Present(cached),
            Err(_) => Self::Failed,
        }
    }
}

/// Cache behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Overwrite the cached text when it differs.
    pub refresh_on_change: bool,
    /// Emit items whose cached text is identical.
    pub emit_unchanged: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            refresh_on_change: true,
            emit_unchanged: false,
        }
    }
}

/// What to do with an item after its cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Unknown item: store its text, emit only if the write succeeds.
    Insert,
    /// Same text as cached.
    Unchanged { emit: bool },
    /// Text differs from the cached one: emit as changed.
    Changed { refresh: bool },
    /// Lookup failed: drop the item.
    Skip,
}

/// Decide how to handle an item given its cache lookup.
pub fn decide(lookup: CacheLookup<'_>, full_text: &str, policy: CachePolicy) -> CacheDecision {
    match lookup {
        CacheLookup::Absent => CacheDecision::Insert,
        CacheLookup::Present(cached) if cached == full_text => CacheDecision::Unchanged {
            emit: policy.emit_unchanged,
        },
        CacheLookup::Present(_) => CacheDecision::Changed {
            refresh: policy.refresh_on_change,
        },
        CacheLookup::Failed => CacheDecision::Skip,
    }
}
