//! Fact Extractor Adapter: one oracle call per message under a strict
//! response contract. No retries, no store access.

use crate::error::OracleError;
use crate::oracle::Oracle;

use serde::Deserialize;

/// Instructions sent with every extraction call. The response contract is
/// enforced by [`RawFact`]'s deserializer, not by trust in the oracle.
const EXTRACTION_INSTRUCTIONS: &str = "\
You classify one chat message from a production operations channel.
Reply with ONLY a JSON object containing exactly these four fields:
  \"client\": the client or project name mentioned, else null
  \"editor\": the editor or person name mentioned, else null
  \"status\": one of \"delivered\", \"in_progress\", \"blocked\", \"waiting\", else null
  \"blocked\": true if work is reported blocked or stuck, false if a block is reported cleared, else null
No prose, no code fences, no extra fields.";

/// The oracle's unvalidated reading of one message. Every field may be
/// absent; the normalizer decides what survives. Unknown fields fail the
/// parse so a drifting oracle is caught instead of half-read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFact {
    pub client: Option<String>,
    pub editor: Option<String>,
    pub status: Option<String>,
    pub blocked: Option<bool>,
}

/// Ask the oracle to classify one message's text.
///
/// Exactly one call; a slow or failed call surfaces as
/// [`OracleError::Unavailable`], an off-contract reply as
/// [`OracleError::MalformedResponse`]. The caller decides whether a missing
/// fact matters.
pub async fn extract(oracle: &impl Oracle, text: &str) -> Result<RawFact, OracleError> {
    let raw = oracle.complete(EXTRACTION_INSTRUCTIONS, text).await?;
    parse_raw_fact(&raw)
}

fn parse_raw_fact(raw: &str) -> Result<RawFact, OracleError> {
    let body = strip_code_fence(raw.trim());
    serde_json::from_str(body).map_err(|error| OracleError::MalformedResponse(error.to_string()))
}

/// Models often wrap JSON in a Markdown fence despite instructions. One
/// fence pair is tolerated; anything else off-contract stays an error.
fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    /// Single-use scripted oracle: hands out its canned reply once.
    struct CannedOracle {
        reply: Mutex<Option<Result<String, OracleError>>>,
    }

    impl CannedOracle {
        fn ok(text: &str) -> Self {
            Self { reply: Mutex::new(Some(Ok(text.to_string()))) }
        }

        fn unavailable(reason: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Err(OracleError::Unavailable(reason.to_string())))),
            }
        }
    }

    impl Oracle for CannedOracle {
        async fn complete(&self, _instructions: &str, _input: &str) -> Result<String, OracleError> {
            self.reply
                .lock()
                .expect("canned reply lock")
                .take()
                .expect("canned reply already consumed")
        }
    }

    #[tokio::test]
    async fn well_formed_response_becomes_raw_fact() {
        let oracle = CannedOracle::ok(
            r#"{"client": "ClientA", "editor": "Jane", "status": null, "blocked": true}"#,
        );
        let fact = extract(&oracle, "ClientA is blocked, editor Jane has not delivered")
            .await
            .expect("extraction should succeed");
        assert_eq!(fact.client.as_deref(), Some("ClientA"));
        assert_eq!(fact.editor.as_deref(), Some("Jane"));
        assert_eq!(fact.status, None);
        assert_eq!(fact.blocked, Some(true));
    }

    #[tokio::test]
    async fn fenced_json_is_tolerated() {
        let oracle = CannedOracle::ok(
            "```json\n{\"client\": null, \"editor\": \"Sam\", \"status\": \"waiting\", \"blocked\": null}\n```",
        );
        let fact = extract(&oracle, "Sam is reviewing").await.expect("extraction should succeed");
        assert_eq!(fact.editor.as_deref(), Some("Sam"));
        assert_eq!(fact.status.as_deref(), Some("waiting"));
    }

    #[tokio::test]
    async fn missing_fields_are_simply_absent() {
        let oracle = CannedOracle::ok(r#"{"blocked": false}"#);
        let fact = extract(&oracle, "all clear").await.expect("extraction should succeed");
        assert_eq!(fact, RawFact { blocked: Some(false), ..RawFact::default() });
    }

    #[tokio::test]
    async fn prose_response_is_malformed() {
        let oracle = CannedOracle::ok("Sure! The client seems to be ClientA.");
        let error = extract(&oracle, "whatever").await.expect_err("prose must be rejected");
        assert!(matches!(error, OracleError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn extra_fields_are_malformed() {
        let oracle = CannedOracle::ok(
            r#"{"client": "A", "editor": null, "status": null, "blocked": null, "confidence": 0.9}"#,
        );
        let error = extract(&oracle, "whatever").await.expect_err("extra fields must be rejected");
        assert!(matches!(error, OracleError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn transport_failure_passes_through_as_unavailable() {
        let oracle = CannedOracle::unavailable("connection refused");
        let error = extract(&oracle, "whatever").await.expect_err("failure must propagate");
        assert!(matches!(error, OracleError::Unavailable(_)));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
    }
}
