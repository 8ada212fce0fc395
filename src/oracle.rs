//! Oracle boundary: the seam for the external classification/reasoning
//! service and its HTTP implementation.

use crate::config::OracleConfig;
use crate::error::OracleError;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Hard ceiling on any single HTTP exchange, independent of the configured
/// per-call budget.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// The external text oracle. One seam: send instructions plus input, get raw
/// text back. Implementations apply their own transport timeouts and map
/// every failure into [`OracleError`].
pub trait Oracle: Send + Sync {
    fn complete(
        &self,
        instructions: &str,
        input: &str,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

/// HTTP client for an OpenAI-compatible chat completions endpoint.
pub struct OracleClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl OracleClient {
    /// Build a client from config. The API key is read from the configured
    /// environment variable, never from the config file.
    pub fn new(config: &OracleConfig) -> crate::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| OracleError::MissingApiKey(config.api_key_env.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .with_context(|| "failed to build oracle HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

impl Oracle for OracleClient {
    async fn complete(&self, instructions: &str, input: &str) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: instructions },
                ChatMessage { role: "user", content: input },
            ],
        };

        // The outer timeout is the call's whole budget; expiry reads the
        // same as a network failure to the caller.
        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| {
            OracleError::Unavailable(format!("no response within {}s", self.timeout.as_secs()))
        })?
        .map_err(|error| OracleError::Unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!(
                "oracle returned HTTP {status}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|error| OracleError::MalformedResponse(error.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| OracleError::MalformedResponse("response carried no choices".to_string()))
    }
}

impl std::fmt::Debug for OracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// Chat completions wire shapes, request side borrows.

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}
