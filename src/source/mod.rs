//! Feed sources.
//!
//! A source is a feed URL with its own polling interval. Sources live in the
//! `sources` table and reach the scheduler through the [`SourceStore`] trait.

mod repository;
mod store;
mod types;

pub use repository::SourceRepository;
pub use store::{normalize_sources, SourceStore, SqlSourceStore};
pub use types::{
    is_valid_interval, NewSource, Source, DEFAULT_INTERVAL, MAX_INTERVAL, MIN_INTERVAL,
    UPDATE_STEP,
};
