//! Chat transport boundary: the adapter trait and the inbound event shape.

mod webhook;

pub use webhook::WebhookAdapter;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Stream of inbound events produced by a running adapter.
pub type InboundStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// One inbound chat event as the transport delivers it. `directed` separates
/// plain channel chatter (ingested for facts) from a directive addressed to
/// the bot (classified and answered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Event id minted at the transport edge.
    pub id: String,
    pub author: String,
    pub channel: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub directed: bool,
}

/// A chat transport adapter. Implementations own their own connection
/// lifecycle; the service only ever sees the inbound stream and `respond`.
pub trait Messaging: Send + Sync {
    /// Adapter name for logs.
    fn name(&self) -> &str;

    /// Start listening and hand back the inbound event stream. The stream
    /// ends when the adapter shuts down.
    fn start(&self) -> impl Future<Output = crate::Result<InboundStream>> + Send;

    /// Deliver a plain-text reply for a handled event. Delivery failure is
    /// reported, never retried at this layer.
    fn respond(
        &self,
        message: &InboundMessage,
        text: &str,
    ) -> impl Future<Output = crate::Result<()>> + Send;

    /// Verify the adapter can still reach its platform.
    fn health_check(&self) -> impl Future<Output = crate::Result<()>> + Send;

    /// Stop listening and release transport resources.
    fn shutdown(&self) -> impl Future<Output = crate::Result<()>> + Send;
}
