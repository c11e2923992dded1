//! Database schema and migrations.
//!
//! Each migration is a SQL script executed in order; the `schema_version`
//! table tracks which ones have been applied. Timestamps are stored as
//! RFC 3339 UTC text on both backends.

/// Database migrations.
#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub const MIGRATIONS: &[&str] = &[
    // v1: Feed sources polled by the scheduler
    r#"
CREATE TABLE sources (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    url              TEXT NOT NULL UNIQUE,
    update_interval  INTEGER NOT NULL DEFAULT 30,   -- seconds
    relevance        REAL NOT NULL DEFAULT 0,
    last_read        TEXT
);
"#,
    // v2: Change-detection cache table
    r#"
CREATE TABLE seen_items (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX idx_seen_items_expires_at ON seen_items(expires_at);
"#,
];

/// Database migrations.
#[cfg(feature = "postgres")]
pub const MIGRATIONS: &[&str] = &[
    // v1: Feed sources polled by the scheduler
    r#"
CREATE TABLE IF NOT EXISTS sources (
    id               BIGSERIAL PRIMARY KEY,
    name             TEXT NOT NULL,
    url              TEXT NOT NULL UNIQUE,
    update_interval  BIGINT NOT NULL DEFAULT 30,
    relevance        DOUBLE PRECISION NOT NULL DEFAULT 0,
    last_read        TEXT
);
"#,
    // v2: Change-detection cache table
    r#"
CREATE TABLE seen_items (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  TEXT NOT NULL
);

CREATE INDEX idx_seen_items_expires_at ON seen_items(expires_at);
"#,
];
