//! Source store seam used by the scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use super::repository::SourceRepository;
use super::types::{NewSource, Source};
use crate::db::Database;
use crate::Result;

/// Persistent source list with interval and last-read metadata.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Load every configured source.
    async fn get_sources(&self) -> Result<Vec<Source>>;

    /// Persist a new polling interval for a source.
    async fn change_update_interval(&self, id: i64, secs: i64) -> Result<()>;

    /// Persist the last poll time of a source.
    async fn set_last_read(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// [`SourceStore`] backed by the `sources` table.
#[derive(Clone)]
pub struct SqlSourceStore {
    db: Database,
}

impl SqlSourceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add the given sources whose URL is not stored yet.
    ///
    /// Every source is validated before anything is written. Returns the
    /// number of sources added.
    pub async fn seed(&self, sources: &[NewSource]) -> Result<usize> {
        for source in sources {
            source.validate()?;
        }

        let repo = SourceRepository::new(self.db.pool());
        let mut added = 0;
        for source in sources {
            if repo.insert_if_absent(source).await? {
                info!(url = %source.url, "Added source {}", source.name);
                added += 1;
            }
        }
        Ok(added)
    }
}

#[async_trait]
impl SourceStore for SqlSourceStore {
    async fn get_sources(&self) -> Result<Vec<Source>> {
        SourceRepository::new(self.db.pool()).list_all().await
    }

    async fn change_update_interval(&self, id: i64, secs: i64) -> Result<()> {
        if !SourceRepository::new(self.db.pool())
            .update_interval(id, secs)
            .await?
        {
            warn!("Interval update for unknown source {}", id);
        }
        Ok(())
    }

    async fn set_last_read(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        SourceRepository::new(self.db.pool())
            .set_last_read(id, at)
            .await?;
        Ok(())
    }
}

/// Reset out-of-range intervals and persist each correction in the background.
///
/// Exactly one `change_update_interval` call is spawned on `tracker` per
/// corrected source. Persistence failures are logged.
pub fn normalize_sources(
    store: &Arc<dyn SourceStore>,
    mut sources: Vec<Source>,
    tracker: &TaskTracker,
) -> Vec<Source> {
    for source in &mut sources {
        let original = source.update_interval;
        if !source.normalize() {
            continue;
        }

        warn!(
            source_id = source.id,
            url = %source.url,
            "Interval {}s out of range, reset to {}s",
            original,
            source.update_interval
        );

        let store = Arc::clone(store);
        let id = source.id;
        let secs = source.update_interval;
        tracker.spawn(async move {
            if let Err(e) = store.change_update_interval(id, secs).await {
                error!("Failed to persist interval for source {}: {}", id, e);
            }
        });
    }
    sources
}
