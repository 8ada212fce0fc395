//! Fact Normalizer: synonym mapping, the admission gate, and entity
//! identity fallback. Deliberately pure so the policy is trivially testable.

use crate::extract::RawFact;
use crate::state::{Fact, RawMessage, Status};

/// Informal vocabulary accepted for each status, canonical labels included.
const STATUS_SYNONYMS: &[(&str, Status)] = &[
    ("delivered", Status::Delivered),
    ("done", Status::Delivered),
    ("finished", Status::Delivered),
    ("completed", Status::Delivered),
    ("blocked", Status::Blocked),
    ("stuck", Status::Blocked),
    ("issue", Status::Blocked),
    ("problem", Status::Blocked),
    ("waiting", Status::Waiting),
    ("pending", Status::Waiting),
    ("awaiting", Status::Waiting),
    ("reviewing", Status::Waiting),
    ("in_progress", Status::InProgress),
    ("working", Status::InProgress),
    ("ongoing", Status::InProgress),
];

/// Turn the oracle's guess into a fact worth storing, or nothing.
///
/// Admission rule, the single policy for the whole system: a fact is kept
/// when it names at least one entity, or carries a recognized status, or
/// reports an active block. `blocked = false` alone admits nothing, and the
/// channel fallback never rescues a fact this rule rejects.
pub fn normalize(raw: RawFact, message: &RawMessage) -> Option<Fact> {
    let entity_client = clean_name(raw.client);
    let entity_editor = clean_name(raw.editor);
    let status = raw.status.as_deref().and_then(map_status);
    let blocked = raw.blocked;

    let admissible = entity_client.is_some()
        || entity_editor.is_some()
        || status.is_some()
        || blocked == Some(true);
    if !admissible {
        return None;
    }

    Some(Fact {
        entity_client,
        entity_editor,
        status,
        blocked,
        source_text: message.text.clone(),
        sent_at: message.sent_at,
    })
}

/// Reconciliation identity for an admitted fact: the fact's own entity
/// (client first, then editor), else the configured default identity, else
/// the message's channel. `None` only when every fallback is empty, in
/// which case the fact has nothing to reconcile against.
pub fn entity_key(fact: &Fact, message: &RawMessage, default_entity: &str) -> Option<String> {
    if let Some(own) = fact.own_entity() {
        return Some(own.to_string());
    }
    if !default_entity.trim().is_empty() {
        return Some(default_entity.trim().to_string());
    }
    if !message.channel.trim().is_empty() {
        return Some(message.channel.trim().to_string());
    }
    None
}

/// Map one informal status token onto the closed set. Case-insensitive;
/// unknown vocabulary maps to no status at all.
fn map_status(token: &str) -> Option<Status> {
    let token = token.trim().to_ascii_lowercase();
    STATUS_SYNONYMS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, status)| *status)
}

/// Trimmed entity name; empty and whitespace-only names count as absent.
fn clean_name(name: Option<String>) -> Option<String> {
    name.map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
