//! Source types.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::SourceEntry;
use crate::feed::validate_url;
use crate::{PollerError, Result};

/// Smallest allowed polling interval in seconds.
pub const MIN_INTERVAL: i64 = 10;

/// Largest allowed polling interval in seconds.
pub const MAX_INTERVAL: i64 = 3600;

/// Interval assigned to sources whose stored interval is out of range.
pub const DEFAULT_INTERVAL: i64 = 30;

/// Interval adjustment step in seconds.
pub const UPDATE_STEP: i64 = 10;

/// Check whether an interval lies within `[MIN_INTERVAL, MAX_INTERVAL]`.
pub fn is_valid_interval(secs: i64) -> bool {
    (MIN_INTERVAL..=MAX_INTERVAL).contains(&secs)
}

/// A polled feed endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    /// Store-assigned ID.
    pub id: i64,
    /// Display name attached to produced items.
    pub name: String,
    /// Feed URL; also the key of the source's timer.
    pub url: String,
    /// Seconds between polls.
    pub update_interval: i64,
    /// Informational weight; not used for scheduling.
    pub relevance: f64,
    /// When the source was last polled.
    pub last_read: Option<DateTime<Utc>>,
}

impl Source {
    /// Create a source with the given interval and no poll history.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        url: impl Into<String>,
        update_interval: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            update_interval,
            relevance: 0.0,
            last_read: None,
        }
    }

    /// Polling interval as a duration.
    ///
    /// Only meaningful after [`Source::normalize`]; negative values map to zero.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval.max(0) as u64)
    }

    /// Reset an out-of-range interval to [`DEFAULT_INTERVAL`].
    ///
    /// Returns `true` when the interval was corrected.
    pub fn normalize(&mut self) -> bool {
        if is_valid_interval(self.update_interval) {
            return false;
        }
        self.update_interval = DEFAULT_INTERVAL;
        true
    }
}

/// New source for creation.
#[derive(Debug, Clone)]
pub struct NewSource {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Polling interval in seconds.
    pub update_interval: i64,
    /// Informational weight.
    pub relevance: f64,
}

impl NewSource {
    /// Create a new source with the default interval.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            update_interval: DEFAULT_INTERVAL,
            relevance: 0.0,
        }
    }

    /// Set the polling interval.
    pub fn with_interval(mut self, secs: i64) -> Self {
        self.update_interval = secs;
        self
    }

    /// Set the relevance.
    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = relevance;
        self
    }

    /// Check that the source has a name and a fetchable URL.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PollerError::Validation(format!(
                "source {} has no name",
                self.url
            )));
        }
        validate_url(&self.url)
            .map_err(|e| PollerError::Validation(format!("source {}: {}", self.url, e)))
    }
}

impl From<&SourceEntry> for NewSource {
    fn from(entry: &SourceEntry) -> Self {
        NewSource::new(entry.name.trim(), entry.url.trim())
            .with_interval(entry.update_interval)
            .with_relevance(entry.relevance)
    }
}
