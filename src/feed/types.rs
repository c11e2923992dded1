//! Parsed feed types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A media attachment of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    /// MIME type as declared by the feed, possibly empty.
    pub media_type: String,
}

/// A feed entry as read from the document, before any classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    /// Publisher-assigned identifier.
    pub guid: Option<String>,
    pub link: Option<String>,
    pub title: String,
    pub description: String,
    /// Full body, e.g. `content:encoded`.
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub enclosures: Vec<Enclosure>,
    /// Extension elements by local name (namespace prefix dropped, case kept).
    pub extensions: BTreeMap<String, Vec<String>>,
}

/// A fetched and parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: String,
    pub items: Vec<RawEntry>,
}
