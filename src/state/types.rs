//! Core domain types for the reconciliation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of workflow statuses a fact can assert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Delivered,
    InProgress,
    Blocked,
    Waiting,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Delivered => "delivered",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::Waiting => "waiting",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "delivered" => Ok(Status::Delivered),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "waiting" => Ok(Status::Waiting),
            other => Err(format!(
                "invalid status: '{other}', expected 'delivered', 'in_progress', 'blocked', or 'waiting'"
            )),
        }
    }
}

/// One inbound chat message, logged verbatim before any interpretation.
/// Write-once: never mutated or deleted after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub author: String,
    pub channel: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// One normalized observation derived from exactly one raw message.
///
/// `blocked` is a cross-cutting flag, not a status value: a fact can report
/// an active block while leaving `status` empty. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub entity_client: Option<String>,
    pub entity_editor: Option<String>,
    pub status: Option<Status>,
    pub blocked: Option<bool>,
    pub source_text: String,
    pub sent_at: DateTime<Utc>,
}

impl Fact {
    /// The identity this fact carries on its own: client name first, then
    /// editor name. `None` means the transport fallback has to supply one.
    pub fn own_entity(&self) -> Option<&str> {
        self.entity_client
            .as_deref()
            .or(self.entity_editor.as_deref())
    }
}

/// The currently-considered-true fact for one entity key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRecord {
    pub entity_key: String,
    pub fact: Fact,
}

impl StateRecord {
    /// Display label for this entity's state. An active block always beats
    /// whatever the status says; no signal at all reads as "unknown".
    pub fn display_state(&self) -> &'static str {
        if self.fact.blocked == Some(true) {
            "BLOCKED"
        } else {
            self.fact.status.map(|status| status.as_str()).unwrap_or("unknown")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn fact(status: Option<Status>, blocked: Option<bool>) -> Fact {
        Fact {
            entity_client: Some("ClientA".to_string()),
            entity_editor: None,
            status,
            blocked,
            source_text: "test".to_string(),
            sent_at: Utc.with_ymd_and_hms(2026, 8, 21, 12, 0, 0).single().expect("valid timestamp"),
        }
    }

    fn record(status: Option<Status>, blocked: Option<bool>) -> StateRecord {
        StateRecord {
            entity_key: "ClientA".to_string(),
            fact: fact(status, blocked),
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            Status::Delivered,
            Status::InProgress,
            Status::Blocked,
            Status::Waiting,
        ] {
            let parsed: Status = status.as_str().parse().expect("round trip should parse");
            assert_eq!(parsed, status);
        }
        assert!("shipped".parse::<Status>().is_err());
    }

    #[test]
    fn blocked_flag_beats_status_in_display() {
        assert_eq!(record(Some(Status::Delivered), Some(true)).display_state(), "BLOCKED");
        assert_eq!(record(Some(Status::InProgress), Some(false)).display_state(), "in_progress");
        assert_eq!(record(Some(Status::Waiting), None).display_state(), "waiting");
        assert_eq!(record(None, None).display_state(), "unknown");
        assert_eq!(record(None, Some(false)).display_state(), "unknown");
    }

    #[test]
    fn own_entity_prefers_client_over_editor() {
        let mut f = fact(None, None);
        f.entity_editor = Some("Jane".to_string());
        assert_eq!(f.own_entity(), Some("ClientA"));
        f.entity_client = None;
        assert_eq!(f.own_entity(), Some("Jane"));
        f.entity_editor = None;
        assert_eq!(f.own_entity(), None);
    }
}
