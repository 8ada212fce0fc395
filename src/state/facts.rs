//! Durable fact storage in the deployment's configured shape.
//!
//! Two shapes survived this system's history and both stay supported:
//!
//! - append mode: every admitted fact is a new `operations` row; "current"
//!   is a read-time reduction picking the winner per entity key
//! - upsert mode: one `production_state` row per entity key, replaced in
//!   place; history is not retained
//!
//! The reconciliation order is the same in both: the winning fact for a key
//! is the one with the maximum `(sent_at, insertion order)` pair. Equal
//! timestamps fall to insertion order, never to arbitrary row order. Append
//! mode gets this from the reduction query; upsert mode enforces it at write
//! time with a guarded replace, so a slow handler finishing late cannot
//! clobber fresher state with an older fact.

use crate::config::StorageMode;
use crate::error::StoreError;
use crate::state::{Fact, StateRecord};

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

// ---------------------------------------------------------------------------
// Append mode
// ---------------------------------------------------------------------------

/// Append-only fact history over the `operations` table.
#[derive(Clone)]
pub struct OperationsLog {
    pool: SqlitePool,
}

impl OperationsLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write one fact under its entity key. Write-once; returns the
    /// monotonically increasing sequence id the store assigned.
    pub async fn append(&self, entity_key: &str, fact: &Fact) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO operations (entity_key, client, editor, status, blocked, original_text, sent_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entity_key)
        .bind(fact.entity_client.as_deref())
        .bind(fact.entity_editor.as_deref())
        .bind(fact.status.map(|status| status.as_str()))
        .bind(fact.blocked)
        .bind(&fact.source_text)
        .bind(fact.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Current state per entity key, key ascending: within each key the row
    /// with the maximum `(sent_at, id)` pair wins.
    pub async fn latest_per_entity(&self) -> Result<Vec<StateRecord>, StoreError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT o.entity_key, o.client, o.editor, o.status, o.blocked, o.original_text, o.sent_at
             FROM operations AS o
             WHERE o.id = (
                 SELECT o2.id FROM operations AS o2
                 WHERE o2.entity_key = o.entity_key
                 ORDER BY o2.sent_at DESC, o2.id DESC
                 LIMIT 1
             )
             ORDER BY o.entity_key ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OperationRow::into_record).collect()
    }

    /// Current state for one entity key.
    pub async fn latest_for(&self, entity_key: &str) -> Result<Option<StateRecord>, StoreError> {
        let row = sqlx::query_as::<_, OperationRow>(
            "SELECT entity_key, client, editor, status, blocked, original_text, sent_at
             FROM operations
             WHERE entity_key = ?
             ORDER BY sent_at DESC, id DESC
             LIMIT 1",
        )
        .bind(entity_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OperationRow::into_record).transpose()
    }

    /// Audit trail: the last `n` facts recorded for one key, in arrival
    /// order newest first (not reconciliation order).
    pub async fn history_for(&self, entity_key: &str, n: u32) -> Result<Vec<Fact>, StoreError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT entity_key, client, editor, status, blocked, original_text, sent_at
             FROM operations
             WHERE entity_key = ?
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(entity_key)
        .bind(i64::from(n))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_record().map(|record| record.fact))
            .collect()
    }
}

impl std::fmt::Debug for OperationsLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationsLog").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Upsert mode
// ---------------------------------------------------------------------------

/// Flat current-state table, one `production_state` row per entity key.
#[derive(Clone)]
pub struct CurrentStateTable {
    pool: SqlitePool,
}

impl CurrentStateTable {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the current fact for a key. Always succeeds and is idempotent.
    ///
    /// The replace is guarded: an incoming fact with a strictly older
    /// `sent_at` than the stored row is dropped, so per-key ordering holds
    /// even when concurrent handlers finish out of order. Equal timestamps
    /// follow call order (last write wins).
    pub async fn put_latest(&self, entity_key: &str, fact: &Fact) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO production_state (entity_key, client, editor, status, blocked, source_text, last_update)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(entity_key) DO UPDATE SET
                 client = excluded.client,
                 editor = excluded.editor,
                 status = excluded.status,
                 blocked = excluded.blocked,
                 source_text = excluded.source_text,
                 last_update = excluded.last_update
             WHERE excluded.last_update >= production_state.last_update",
        )
        .bind(entity_key)
        .bind(fact.entity_client.as_deref())
        .bind(fact.entity_editor.as_deref())
        .bind(fact.status.map(|status| status.as_str()))
        .bind(fact.blocked)
        .bind(&fact.source_text)
        .bind(fact.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current state for one entity key.
    pub async fn get_latest(&self, entity_key: &str) -> Result<Option<StateRecord>, StoreError> {
        let row = sqlx::query_as::<_, StateRow>(
            "SELECT entity_key, client, editor, status, blocked, source_text, last_update
             FROM production_state
             WHERE entity_key = ?",
        )
        .bind(entity_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StateRow::into_record).transpose()
    }

    /// Current state for every known entity key, key ascending.
    pub async fn get_all_latest(&self) -> Result<Vec<StateRecord>, StoreError> {
        let rows = sqlx::query_as::<_, StateRow>(
            "SELECT entity_key, client, editor, status, blocked, source_text, last_update
             FROM production_state
             ORDER BY entity_key ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StateRow::into_record).collect()
    }
}

impl std::fmt::Debug for CurrentStateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentStateTable").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// The deployment's fact store, in whichever shape configuration selected.
/// Handed explicitly to every component that touches state; there is no
/// global connection.
#[derive(Debug, Clone)]
pub enum StateStore {
    Append(OperationsLog),
    Upsert(CurrentStateTable),
}

impl StateStore {
    pub fn new(pool: SqlitePool, mode: StorageMode) -> Self {
        match mode {
            StorageMode::Append => StateStore::Append(OperationsLog::new(pool)),
            StorageMode::Upsert => StateStore::Upsert(CurrentStateTable::new(pool)),
        }
    }

    /// Merge one admitted fact under its entity key.
    pub async fn record(&self, entity_key: &str, fact: &Fact) -> Result<(), StoreError> {
        match self {
            StateStore::Append(log) => {
                log.append(entity_key, fact).await?;
                Ok(())
            }
            StateStore::Upsert(table) => table.put_latest(entity_key, fact).await,
        }
    }

    /// Current state for every known entity key, key ascending.
    pub async fn current(&self) -> Result<Vec<StateRecord>, StoreError> {
        match self {
            StateStore::Append(log) => log.latest_per_entity().await,
            StateStore::Upsert(table) => table.get_all_latest().await,
        }
    }

    /// Current state for one entity key.
    pub async fn current_for(&self, entity_key: &str) -> Result<Option<StateRecord>, StoreError> {
        match self {
            StateStore::Append(log) => log.latest_for(entity_key).await,
            StateStore::Upsert(table) => table.get_latest(entity_key).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Internal row type for the `operations` table.
#[derive(sqlx::FromRow)]
struct OperationRow {
    entity_key: String,
    client: Option<String>,
    editor: Option<String>,
    status: Option<String>,
    blocked: Option<bool>,
    original_text: String,
    sent_at: DateTime<Utc>,
}

impl OperationRow {
    fn into_record(self) -> Result<StateRecord, StoreError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(StateRecord {
            entity_key: self.entity_key,
            fact: Fact {
                entity_client: self.client,
                entity_editor: self.editor,
                status,
                blocked: self.blocked,
                source_text: self.original_text,
                sent_at: self.sent_at,
            },
        })
    }
}

/// Internal row type for the `production_state` table.
#[derive(sqlx::FromRow)]
struct StateRow {
    entity_key: String,
    client: Option<String>,
    editor: Option<String>,
    status: Option<String>,
    blocked: Option<bool>,
    source_text: String,
    last_update: DateTime<Utc>,
}

impl StateRow {
    fn into_record(self) -> Result<StateRecord, StoreError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(StateRecord {
            entity_key: self.entity_key,
            fact: Fact {
                entity_client: self.client,
                entity_editor: self.editor,
                status,
                blocked: self.blocked,
                source_text: self.source_text,
                sent_at: self.last_update,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::db;
    use crate::state::Status;
    use chrono::TimeZone as _;

    async fn setup(mode: StorageMode) -> StateStore {
        let pool = db::connect(&StorageConfig {
            path: ":memory:".to_string(),
            mode,
        })
        .await
        .expect("connect in-memory db");
        StateStore::new(pool, mode)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 21, 10, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn fact(status: Option<Status>, blocked: Option<bool>, minute: u32) -> Fact {
        Fact {
            entity_client: Some("ClientA".to_string()),
            entity_editor: Some("Jane".to_string()),
            status,
            blocked,
            source_text: format!("update at minute {minute}"),
            sent_at: at(minute),
        }
    }

    #[tokio::test]
    async fn append_reduction_ignores_arrival_order() {
        let store = setup(StorageMode::Append).await;
        // The fresher fact lands first; the stale one arrives late.
        store
            .record("ClientA", &fact(Some(Status::Delivered), None, 30))
            .await
            .expect("record fresh fact");
        store
            .record("ClientA", &fact(Some(Status::Waiting), None, 10))
            .await
            .expect("record stale fact");

        let current = store
            .current_for("ClientA")
            .await
            .expect("read current state")
            .expect("key should be known");
        assert_eq!(current.fact.status, Some(Status::Delivered));
        assert_eq!(current.fact.sent_at, at(30));
    }

    #[tokio::test]
    async fn append_reduction_breaks_timestamp_ties_by_insertion_order() {
        let store = setup(StorageMode::Append).await;
        store
            .record("ClientA", &fact(Some(Status::Waiting), None, 15))
            .await
            .expect("record first fact");
        store
            .record("ClientA", &fact(Some(Status::Delivered), None, 15))
            .await
            .expect("record second fact");

        let current = store
            .current_for("ClientA")
            .await
            .expect("read current state")
            .expect("key should be known");
        assert_eq!(
            current.fact.status,
            Some(Status::Delivered),
            "later insertion wins an exact timestamp tie"
        );
    }

    #[tokio::test]
    async fn append_current_returns_one_record_per_key_sorted() {
        let store = setup(StorageMode::Append).await;
        for key in ["zeta", "alpha", "alpha", "mid"] {
            store
                .record(key, &fact(Some(Status::InProgress), None, 5))
                .await
                .expect("record fact");
        }

        let current = store.current().await.expect("read current state");
        let keys: Vec<&str> = current.iter().map(|record| record.entity_key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn append_sequence_ids_increase() {
        let store = setup(StorageMode::Append).await;
        let StateStore::Append(log) = &store else {
            panic!("expected append mode");
        };
        let first = log
            .append("ClientA", &fact(None, Some(true), 1))
            .await
            .expect("append fact");
        let second = log
            .append("ClientA", &fact(None, Some(false), 2))
            .await
            .expect("append fact");
        assert!(second > first);
    }

    #[tokio::test]
    async fn append_history_is_arrival_ordered_and_limited() {
        let store = setup(StorageMode::Append).await;
        let StateStore::Append(log) = &store else {
            panic!("expected append mode");
        };
        // Minute 40 arrives before minute 20: history must show arrival order.
        log.append("ClientA", &fact(Some(Status::Waiting), None, 40))
            .await
            .expect("append fact");
        log.append("ClientA", &fact(Some(Status::Blocked), Some(true), 20))
            .await
            .expect("append fact");
        log.append("ClientA", &fact(Some(Status::Delivered), Some(false), 50))
            .await
            .expect("append fact");

        let history = log.history_for("ClientA", 2).await.expect("read history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, Some(Status::Delivered));
        assert_eq!(history[1].status, Some(Status::Blocked));
    }

    #[tokio::test]
    async fn upsert_guard_drops_stale_write() {
        let store = setup(StorageMode::Upsert).await;
        store
            .record("ClientA", &fact(Some(Status::Delivered), Some(false), 30))
            .await
            .expect("record fresh fact");
        store
            .record("ClientA", &fact(Some(Status::Blocked), Some(true), 10))
            .await
            .expect("stale write still succeeds");

        let current = store
            .current_for("ClientA")
            .await
            .expect("read current state")
            .expect("key should be known");
        assert_eq!(current.fact.status, Some(Status::Delivered));
        assert_eq!(current.fact.blocked, Some(false));
        assert_eq!(current.fact.sent_at, at(30));
    }

    #[tokio::test]
    async fn upsert_equal_timestamps_follow_call_order() {
        let store = setup(StorageMode::Upsert).await;
        store
            .record("ClientA", &fact(Some(Status::Waiting), None, 15))
            .await
            .expect("record first fact");
        store
            .record("ClientA", &fact(Some(Status::Delivered), None, 15))
            .await
            .expect("record second fact");

        let current = store
            .current_for("ClientA")
            .await
            .expect("read current state")
            .expect("key should be known");
        assert_eq!(current.fact.status, Some(Status::Delivered));
    }

    #[tokio::test]
    async fn upsert_is_idempotent_for_identical_facts() {
        let store = setup(StorageMode::Upsert).await;
        let same = fact(Some(Status::InProgress), Some(false), 25);
        store.record("ClientA", &same).await.expect("first write");
        let after_first = store
            .current_for("ClientA")
            .await
            .expect("read current state");
        store.record("ClientA", &same).await.expect("second write");
        let after_second = store
            .current_for("ClientA")
            .await
            .expect("read current state");
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn upsert_all_latest_sorted_by_key() {
        let store = setup(StorageMode::Upsert).await;
        for key in ["zeta", "alpha", "mid"] {
            store
                .record(key, &fact(Some(Status::InProgress), None, 5))
                .await
                .expect("record fact");
        }

        let current = store.current().await.expect("read current state");
        let keys: Vec<&str> = current.iter().map(|record| record.entity_key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn unknown_key_reads_as_none_in_both_modes() {
        for mode in [StorageMode::Append, StorageMode::Upsert] {
            let store = setup(mode).await;
            let current = store
                .current_for("nobody")
                .await
                .expect("read current state");
            assert!(current.is_none(), "mode {mode} should return None");
            assert!(store.current().await.expect("read all").is_empty());
        }
    }

    #[tokio::test]
    async fn blocked_flag_round_trips_in_both_modes() {
        for mode in [StorageMode::Append, StorageMode::Upsert] {
            let store = setup(mode).await;
            store
                .record("ClientA", &fact(None, Some(true), 5))
                .await
                .expect("record fact");
            let current = store
                .current_for("ClientA")
                .await
                .expect("read current state")
                .expect("key should be known");
            assert_eq!(current.fact.blocked, Some(true), "mode {mode}");
            assert_eq!(current.fact.status, None, "mode {mode}");
        }
    }
}
