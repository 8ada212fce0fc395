//! Append-only log of raw inbound messages.

use crate::error::StoreError;
use crate::state::RawMessage;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Durable log of every non-system inbound message, written before any
/// interpretation happens. Fully independent of fact storage: a message is
/// logged whether or not extraction later produces anything.
#[derive(Clone)]
pub struct MessageLog {
    pool: SqlitePool,
}

impl MessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist one raw message. Returns the surrogate row id.
    pub async fn append(&self, message: &RawMessage) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO messages (author, channel, text, sent_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&message.author)
        .bind(&message.channel)
        .bind(&message.text)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The last `n` messages by arrival, most recent first. Returns fewer
    /// when history is shorter; empty history is an empty list, not an error.
    pub async fn recent(&self, n: u32) -> Result<Vec<RawMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT author, channel, text, sent_at FROM messages ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(n))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}

impl std::fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageLog").finish_non_exhaustive()
    }
}

/// Internal row type for sqlx deserialization.
#[derive(sqlx::FromRow)]
struct MessageRow {
    author: String,
    channel: String,
    text: String,
    sent_at: DateTime<Utc>,
}

impl MessageRow {
    fn into_message(self) -> RawMessage {
        RawMessage {
            author: self.author,
            channel: self.channel,
            text: self.text,
            sent_at: self.sent_at,
        }
    }
}
