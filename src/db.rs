//! SQLite bootstrap: pool construction and the embedded schema.

use crate::config::StorageConfig;
use crate::error::StoreError;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use std::str::FromStr;
use std::time::Duration;

/// Open (or create) the service database and run the embedded schema.
///
/// File databases get WAL mode and a small pool; an in-memory database is
/// pinned to a single connection so every query sees the same data.
pub async fn connect(config: &StorageConfig) -> Result<SqlitePool, StoreError> {
    let in_memory = config.path == ":memory:";
    let url = if in_memory {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{}?mode=rwc", config.path)
    };

    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|error| StoreError::InvalidPath(error.to_string()))?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    // An in-memory database lives inside its one connection: pin the pool to
    // that connection and never recycle it, or the data vanishes mid-run.
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };
    let pool = pool_options.connect_with(options).await?;

    run_schema(&pool).await?;

    Ok(pool)
}

/// Run the embedded schema. Raw SQL rather than sqlx::migrate! so a single
/// binary carries its whole storage definition.
async fn run_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

/// Embedded schema. All statements use `IF NOT EXISTS` so re-running is safe.
///
/// Timestamps are stored as RFC 3339 UTC text; with a single writer encoding,
/// lexicographic order on these columns is chronological order, which the
/// append-mode reduction relies on.
const SCHEMA: &str = r#"
-- Raw inbound messages, logged before any interpretation.
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author TEXT NOT NULL,
    channel TEXT NOT NULL,
    text TEXT NOT NULL,
    sent_at TEXT NOT NULL
);

-- Append-only fact history (storage mode "append").
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_key TEXT NOT NULL,
    client TEXT,
    editor TEXT,
    status TEXT,
    blocked INTEGER,
    original_text TEXT NOT NULL,
    sent_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_operations_entity ON operations(entity_key, sent_at, id);

-- Flat current-state table (storage mode "upsert").
CREATE TABLE IF NOT EXISTS production_state (
    entity_key TEXT PRIMARY KEY,
    client TEXT,
    editor TEXT,
    status TEXT,
    blocked INTEGER,
    source_text TEXT NOT NULL,
    last_update TEXT NOT NULL
);
"#;
