//! Command Router: classify a directive into a fixed set of intents and
//! dispatch. Stateless per invocation; no conversation memory.

use crate::oracle::Oracle;
use crate::reply;
use crate::snapshot::SnapshotEngine;

use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Platform mention tokens, e.g. `<@U0234AB>`.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[^>]+>").expect("hardcoded regex"));

/// Instructions for the free-form path. The snapshot the user is asking
/// about rides in the input text; the answer goes back verbatim.
const ANSWER_INSTRUCTIONS: &str = "\
You are an operations assistant for a production team.
Answer the question using only the operations snapshot provided with it.
Be brief and factual. If the snapshot does not contain the answer, say so.";

/// What a directive asks for. Matching is an ordered priority list, not a
/// set of mutually exclusive patterns: the first predicate that hits wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Replay the most recent raw messages.
    RecentRaw(u32),
    /// List entities with an active block.
    Blocked,
    /// The full current-state table.
    Snapshot,
    /// Anything else: answer from the snapshot via the oracle.
    FreeForm,
}

/// Classify one directive. The text is mention-stripped, trimmed, and
/// case-folded before the predicates run.
pub fn classify(text: &str) -> Intent {
    let normalized = strip_mentions(text).to_lowercase();
    if normalized.contains("last 5") {
        Intent::RecentRaw(5)
    } else if normalized.contains("blocked") {
        Intent::Blocked
    } else if normalized.contains("status") {
        Intent::Snapshot
    } else {
        Intent::FreeForm
    }
}

/// Remove platform mention tokens and surrounding whitespace, preserving
/// the text's own casing.
fn strip_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").trim().to_string()
}

/// Stateless directive dispatcher. Each call classifies, queries, formats.
/// Failures never propagate to the transport: store trouble degrades to the
/// fixed data-unavailable reply, oracle trouble to the fixed no-answer one.
pub struct Router<O> {
    snapshots: SnapshotEngine,
    oracle: Arc<O>,
}

impl<O: Oracle> Router<O> {
    pub fn new(snapshots: SnapshotEngine, oracle: Arc<O>) -> Self {
        Self { snapshots, oracle }
    }

    /// Answer one directive.
    pub async fn answer(&self, text: &str) -> String {
        match classify(text) {
            Intent::RecentRaw(n) => match self.snapshots.recent_raw(n).await {
                Ok(messages) => reply::recent_messages(&messages),
                Err(error) => {
                    tracing::error!(%error, "recent messages query failed");
                    reply::DATA_UNAVAILABLE.to_string()
                }
            },
            Intent::Blocked => match self.snapshots.blocked_entities().await {
                Ok(records) => reply::blocked_list(&records),
                Err(error) => {
                    tracing::error!(%error, "blocked entities query failed");
                    reply::DATA_UNAVAILABLE.to_string()
                }
            },
            Intent::Snapshot => match self.snapshots.full_snapshot().await {
                Ok(records) => reply::snapshot_table(&records),
                Err(error) => {
                    tracing::error!(%error, "snapshot query failed");
                    reply::DATA_UNAVAILABLE.to_string()
                }
            },
            Intent::FreeForm => self.free_form(text).await,
        }
    }

    /// Free-form path: forward the snapshot, the wall-clock time, and the
    /// question to the oracle and relay its answer untouched. An empty
    /// snapshot skips the oracle entirely.
    async fn free_form(&self, text: &str) -> String {
        let records = match self.snapshots.full_snapshot().await {
            Ok(records) => records,
            Err(error) => {
                tracing::error!(%error, "snapshot query failed");
                return reply::DATA_UNAVAILABLE.to_string();
            }
        };
        if records.is_empty() {
            return reply::NO_ANSWER.to_string();
        }

        let question = strip_mentions(text);
        let input = format!(
            "Current time (ms since epoch): {}\n\n{}\n\nQuestion: {}",
            Utc::now().timestamp_millis(),
            reply::snapshot_table(&records),
            question,
        );
        match self.oracle.complete(ANSWER_INSTRUCTIONS, &input).await {
            Ok(answer) => answer,
            Err(error) => {
                tracing::warn!(%error, "free-form oracle call failed");
                reply::NO_ANSWER.to_string()
            }
        }
    }
}

impl<O> std::fmt::Debug for Router<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}
