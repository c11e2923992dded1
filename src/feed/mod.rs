//! Feed fetching and parsing.

mod fetcher;
mod parse;
mod types;

pub use fetcher::{sample, validate_url, FeedFetcher, HttpFeedFetcher};
pub use parse::{parse_date, parse_feed};
pub use types::{Enclosure, ParsedFeed, RawEntry};
