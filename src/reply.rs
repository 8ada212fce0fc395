//! Fixed reply strings and list formatting for directive answers.

use crate::state::{RawMessage, StateRecord};

pub const NO_MESSAGES: &str = "No messages stored yet.";
pub const NO_BLOCKED: &str = "No blocked operations found.";
pub const NO_OPERATIONS: &str = "No operations found.";
/// Directive-path degradation when the store cannot be read.
pub const DATA_UNAVAILABLE: &str = "Sorry, I can't reach the operations data right now.";
/// Free-form fallback: empty snapshot, or the oracle failed.
pub const NO_ANSWER: &str = "I don't have enough operations data to answer that yet.";

/// Numbered replay of recent raw messages.
pub fn recent_messages(messages: &[RawMessage]) -> String {
    if messages.is_empty() {
        return NO_MESSAGES.to_string();
    }
    let mut reply = String::from("Here are the last 5 messages:");
    for (index, message) in messages.iter().enumerate() {
        reply.push_str(&format!("\n{}. {}", index + 1, message.text));
    }
    reply
}

/// One line per blocked entity. The client label is preferred; an entity
/// known only by editor name gets the editor label; a bare key stands alone.
pub fn blocked_list(records: &[StateRecord]) -> String {
    if records.is_empty() {
        return NO_BLOCKED.to_string();
    }
    let mut reply = String::from("Blocked items:");
    for record in records {
        let line = match (&record.fact.entity_client, &record.fact.entity_editor) {
            (Some(client), _) => format!("Client {client} is blocked"),
            (None, Some(editor)) => format!("Editor {editor} is blocked"),
            (None, None) => format!("{} is blocked", record.entity_key),
        };
        reply.push('\n');
        reply.push_str(&line);
    }
    reply
}

/// The status board: one `key — state — editor` line per entity.
pub fn snapshot_table(records: &[StateRecord]) -> String {
    if records.is_empty() {
        return NO_OPERATIONS.to_string();
    }
    let mut reply = String::from("OPERATIONS SNAPSHOT:\n");
    for record in records {
        let editor = record.fact.entity_editor.as_deref().unwrap_or("No editor");
        reply.push_str(&format!(
            "\n{} — {} — {}",
            record.entity_key,
            record.display_state(),
            editor
        ));
    }
    reply
}
