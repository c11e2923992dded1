//! Feed document parsing.
//!
//! RSS 2.0 is read with the `rss` crate, which keeps GUIDs as published and
//! exposes namespaced extension elements. Anything it rejects (Atom, JSON
//! Feed, RSS 1.0) goes through `feed-rs`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::trace;

use super::types::{Enclosure, ParsedFeed, RawEntry};
use crate::{PollerError, Result};

/// Parse feed bytes into a [`ParsedFeed`].
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(from_channel(channel)),
        Err(rss_err) => {
            trace!("Not an RSS 2.0 document ({}), trying feed-rs", rss_err);
            let feed = feed_rs::parser::parse(bytes)
                .map_err(|e| PollerError::Feed(format!("failed to parse feed: {}", e)))?;
            Ok(from_feed_rs(feed))
        }
    }
}

fn from_channel(channel: rss::Channel) -> ParsedFeed {
    let title = channel.title().to_string();
    let items = channel.items().iter().map(from_rss_item).collect();
    ParsedFeed { title, items }
}

fn from_rss_item(item: &rss::Item) -> RawEntry {
    let mut extensions: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for by_name in item.extensions().values() {
        for (name, values) in by_name {
            let texts = values.iter().filter_map(|ext| ext.value().map(str::to_string));
            extensions.entry(name.clone()).or_default().extend(texts);
        }
    }

    RawEntry {
        guid: item.guid().map(|g| g.value().to_string()),
        link: item.link().map(str::to_string),
        title: item.title().unwrap_or_default().to_string(),
        description: item.description().unwrap_or_default().to_string(),
        content: item.content().map(str::to_string),
        published: rss_published(item),
        categories: item
            .categories()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        enclosures: item
            .enclosure()
            .map(|e| Enclosure {
                url: e.url().to_string(),
                media_type: e.mime_type().to_string(),
            })
            .into_iter()
            .collect(),
        extensions,
    }
}

fn rss_published(item: &rss::Item) -> Option<DateTime<Utc>> {
    if let Some(date) = item.pub_date().and_then(parse_date) {
        return Some(date);
    }
    item.dublin_core_ext()
        .and_then(|dc| dc.dates().first())
        .and_then(|d| parse_date(d))
}

/// Parse an RFC 2822 or RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn from_feed_rs(feed: feed_rs::model::Feed) -> ParsedFeed {
    let title = feed.title.map(|t| t.content).unwrap_or_default();
    let items = feed.entries.into_iter().map(from_feed_rs_entry).collect();
    ParsedFeed { title, items }
}

fn from_feed_rs_entry(entry: feed_rs::model::Entry) -> RawEntry {
    let mut enclosures: Vec<Enclosure> = entry
        .links
        .iter()
        .filter(|l| l.rel.as_deref() == Some("enclosure"))
        .map(|l| Enclosure {
            url: l.href.clone(),
            media_type: l.media_type.clone().unwrap_or_default(),
        })
        .collect();
    for media in &entry.media {
        for content in &media.content {
            if let Some(url) = &content.url {
                enclosures.push(Enclosure {
                    url: url.to_string(),
                    media_type: content
                        .content_type
                        .as_ref()
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                });
            }
        }
    }

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .map(|l| l.href.clone());

    RawEntry {
        guid: Some(entry.id).filter(|id| !id.is_empty()),
        link,
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description: entry.summary.map(|t| t.content).unwrap_or_default(),
        content: entry.content.and_then(|c| c.body),
        published: entry.published.or(entry.updated),
        categories: entry.categories.into_iter().map(|c| c.term).collect(),
        enclosures,
        extensions: BTreeMap::new(),
    }
}
