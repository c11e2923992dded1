//! Entry filters applied around the worker stage.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::config::{DateFilterMode, PipelineConfig};

/// Link fragments that mark sponsored or media-only pages.
pub const LINK_DENYLIST: [&str; 12] = [
    "erid=",
    "/video/",
    "/photo/",
    "/audio/",
    "/gallery/",
    "/photoslider/",
    "/photos/",
    "/videos/",
    "/audios/",
    "/galleries/",
    "/podcast/",
    "/podcasts/",
];

/// Upper bound for a configured age window (about a century).
const MAX_AGE_CAP_HOURS: u64 = 100 * 366 * 24;

/// Whether a link passes the denylist.
pub fn is_allowed_link(link: &str) -> bool {
    !LINK_DENYLIST.iter().any(|fragment| link.contains(fragment))
}

/// Publish-date window for entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishedFilter {
    /// Keep every dated entry.
    Any,
    /// Keep entries published on today's date in the given timezone.
    SameDay(Tz),
    /// Keep entries not older than the given age.
    MaxAge(Duration),
}

impl PublishedFilter {
    pub fn from_config(config: &PipelineConfig, tz: Tz) -> Self {
        match config.date_filter {
            DateFilterMode::Any => Self::Any,
            DateFilterMode::SameDay => Self::SameDay(tz),
            DateFilterMode::MaxAge => {
                Self::MaxAge(Duration::hours(config.max_age_hours.min(MAX_AGE_CAP_HOURS) as i64))
            }
        }
    }

    /// Whether an entry published at `published` is kept at `now`.
    ///
    /// Undated entries are never kept.
    pub fn keep(&self, published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(published) = published else {
            return false;
        };
        match self {
            Self::Any => true,
            Self::SameDay(tz) => {
                published.with_timezone(tz).date_naive() == now.with_timezone(tz).date_naive()
            }
            Self::MaxAge(max_age) => now.signed_duration_since(published) <= *max_age,
        }
    }
}
