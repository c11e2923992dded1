//! Database-backed cache.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::ChangeCache;
use crate::db::{format_datetime, Database, DbPool};
use crate::{PollerError, Result};

/// Repository for the `seen_items` table.
pub struct SeenItemRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SeenItemRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get the value of a key that has not expired at `now`.
    pub async fn get_live(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM seen_items WHERE key = $1 AND expires_at > $2",
        )
        .bind(key)
        .bind(format_datetime(&now))
        .fetch_optional(self.pool)
        .await?;

        Ok(value)
    }

    /// Insert or replace a key.
    pub async fn upsert(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seen_items (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(format_datetime(&expires_at))
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete every entry that expired at or before `now`.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM seen_items WHERE expires_at <= $1")
            .bind(format_datetime(&now))
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Count stored entries.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM seen_items")
            .fetch_one(self.pool)
            .await?;

        Ok(count.0)
    }
}

/// [`ChangeCache`] stored in the `seen_items` table.
#[derive(Clone)]
pub struct SqlCache {
    db: Database,
}

impl SqlCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChangeCache for SqlCache {
    async fn exists(&self, key: &str) -> Result<Option<String>> {
        SeenItemRepository::new(self.db.pool())
            .get_live(key, Utc::now())
            .await
            .map_err(|e| PollerError::Cache(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| PollerError::Cache(format!("invalid ttl: {}", e)))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| PollerError::Cache("ttl out of range".to_string()))?;
        SeenItemRepository::new(self.db.pool())
            .upsert(key, value, expires_at)
            .await
            .map_err(|e| PollerError::Cache(e.to_string()))
    }

    async fn purge_expired(&self) -> Result<u64> {
        let removed = SeenItemRepository::new(self.db.pool())
            .delete_expired(Utc::now())
            .await
            .map_err(|e| PollerError::Cache(e.to_string()))?;
        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }
}
