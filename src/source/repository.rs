//! Source repository.

use chrono::{DateTime, Utc};

use super::types::{NewSource, Source};
use crate::db::{format_datetime, parse_datetime, DbPool};
use crate::Result;

/// Row type for a source from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: i64,
    name: String,
    url: String,
    update_interval: i64,
    relevance: f64,
    last_read: Option<String>,
}

impl From<SourceRow> for Source {
    fn from(row: SourceRow) -> Self {
        Source {
            id: row.id,
            name: row.name,
            url: row.url,
            update_interval: row.update_interval,
            relevance: row.relevance,
            last_read: row.last_read.and_then(|s| parse_datetime(&s)),
        }
    }
}

/// Repository for source operations.
pub struct SourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SourceRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a source unless one with the same URL already exists.
    ///
    /// Returns `true` when a row was inserted.
    pub async fn insert_if_absent(&self, source: &NewSource) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO sources (name, url, update_interval, relevance)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(&source.name)
        .bind(&source.url)
        .bind(source.update_interval)
        .bind(source.relevance)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all sources (ordered by ID).
    pub async fn list_all(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT id, name, url, update_interval, relevance, last_read
            FROM sources
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Source::from).collect())
    }

    /// Set the polling interval of a source.
    pub async fn update_interval(&self, id: i64, secs: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE sources SET update_interval = $1 WHERE id = $2")
            .bind(secs)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record when a source was last polled.
    pub async fn set_last_read(&self, id: i64, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE sources SET last_read = $1 WHERE id = $2")
            .bind(format_datetime(&at))
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
