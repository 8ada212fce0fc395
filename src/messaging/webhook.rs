//! HTTP webhook messaging adapter.
//!
//! Inbound events arrive as `POST /v1/events` and are queued onto the
//! adapter's stream. Replies are POSTed to the configured `reply_url`, or
//! logged when none is set.

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::messaging::{InboundMessage, InboundStream, Messaging};

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

/// Ceiling on one outbound reply POST.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Queue depth between the HTTP handler and the event loop.
const INBOUND_QUEUE: usize = 256;

/// Webhook adapter state.
pub struct WebhookAdapter {
    bind_addr: String,
    reply_url: String,
    http: reqwest::Client,
    /// Shutdown signal for the listener task.
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

/// Handler-side state: where accepted events go.
struct ListenerState {
    inbound_tx: mpsc::Sender<InboundMessage>,
}

impl WebhookAdapter {
    pub fn new(config: &TransportConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REPLY_TIMEOUT)
            .build()
            .map_err(|error| TransportError::Delivery(error.to_string()))?;

        Ok(Self {
            bind_addr: config.bind_addr.clone(),
            reply_url: config.reply_url.clone(),
            http,
            shutdown_tx: Arc::new(RwLock::new(None)),
        })
    }
}

impl Messaging for WebhookAdapter {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn start(&self) -> crate::Result<InboundStream> {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        *self.shutdown_tx.write().await = Some(shutdown_tx);

        let state = Arc::new(ListenerState { inbound_tx });
        let app = axum::Router::new()
            .route("/v1/events", post(receive_event))
            .route("/healthz", get(healthz))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|error| {
                TransportError::Listener(format!("failed to bind {}: {error}", self.bind_addr))
            })?;

        let local_addr = listener
            .local_addr()
            .map_err(|error| TransportError::Listener(error.to_string()))?;

        tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                shutdown_rx.recv().await;
                tracing::info!("webhook listener shutting down");
            });
            if let Err(error) = serve.await {
                tracing::warn!(%error, "webhook listener ended unexpectedly");
            }
        });

        tracing::info!(addr = %local_addr, "webhook listener started");
        let stream = tokio_stream::wrappers::ReceiverStream::new(inbound_rx);
        Ok(Box::pin(stream))
    }

    async fn respond(&self, message: &InboundMessage, text: &str) -> crate::Result<()> {
        if self.reply_url.is_empty() {
            tracing::info!(channel = %message.channel, reply = %text, "reply (no reply_url configured)");
            return Ok(());
        }

        let response = self
            .http
            .post(&self.reply_url)
            .json(&ReplyBody { channel: &message.channel, text })
            .send()
            .await
            .map_err(|error| TransportError::Delivery(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Delivery(format!("reply endpoint returned HTTP {status}")).into());
        }

        Ok(())
    }

    async fn health_check(&self) -> crate::Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> crate::Result<()> {
        if let Some(tx) = self.shutdown_tx.read().await.as_ref() {
            tx.send(()).await.ok();
        }
        tracing::info!("webhook adapter shut down");
        Ok(())
    }
}

impl std::fmt::Debug for WebhookAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookAdapter")
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct EventRequest {
    author: String,
    channel: String,
    text: String,
    /// Missing timestamps default to arrival time.
    #[serde(default)]
    sent_at: Option<DateTime<Utc>>,
    /// True marks a directive (the platform's app-mention equivalent).
    #[serde(default)]
    directed: bool,
}

#[derive(Debug, Serialize)]
struct EventResponse {
    id: String,
}

#[derive(Serialize)]
struct ReplyBody<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Accept one inbound event and queue it for the pipeline. `202` means
/// accepted-for-processing; handling happens on the event loop's schedule.
async fn receive_event(
    State(state): State<Arc<ListenerState>>,
    Json(request): Json<EventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), StatusCode> {
    let message = InboundMessage {
        id: uuid::Uuid::new_v4().to_string(),
        author: request.author,
        channel: request.channel,
        text: request.text,
        sent_at: request.sent_at.unwrap_or_else(Utc::now),
        directed: request.directed,
    };
    let id = message.id.clone();

    state.inbound_tx.send(message).await.map_err(|_| {
        tracing::warn!("inbound queue closed, rejecting webhook event");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok((StatusCode::ACCEPTED, Json(EventResponse { id })))
}

async fn healthz() -> &'static str {
    "ok"
}
