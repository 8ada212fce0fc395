//! Snapshot Query Engine: read-only views over the state store and the
//! message log.

use crate::error::StoreError;
use crate::state::{MessageLog, RawMessage, StateRecord, StateStore};

/// Read-side engine. Every operation is a pure read reflecting only writes
/// committed before it started, and returns an explicit empty result rather
/// than an error when nothing matches.
#[derive(Debug, Clone)]
pub struct SnapshotEngine {
    store: StateStore,
    messages: MessageLog,
}

impl SnapshotEngine {
    pub fn new(store: StateStore, messages: MessageLog) -> Self {
        Self { store, messages }
    }

    /// Entities whose current record reports an active block, key ascending.
    /// A block that a later fact cleared or dropped does not count, no
    /// matter what older history says.
    pub async fn blocked_entities(&self) -> Result<Vec<StateRecord>, StoreError> {
        let mut records = self.store.current().await?;
        records.retain(|record| record.fact.blocked == Some(true));
        Ok(records)
    }

    /// Current record for every known entity, key ascending.
    pub async fn full_snapshot(&self) -> Result<Vec<StateRecord>, StoreError> {
        self.store.current().await
    }

    /// The last `n` raw messages by arrival, most recent first.
    pub async fn recent_raw(&self, n: u32) -> Result<Vec<RawMessage>, StoreError> {
        self.messages.recent(n).await
    }
}
