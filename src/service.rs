//! Event pipeline: drives the inbound stream and spawns one handler task per
//! event, so a slow oracle call on one message never stalls another.

use crate::config::StorageMode;
use crate::extract;
use crate::messaging::{InboundMessage, Messaging};
use crate::normalize;
use crate::oracle::Oracle;
use crate::router::Router;
use crate::snapshot::SnapshotEngine;
use crate::state::{MessageLog, RawMessage, StateStore};

use futures::StreamExt as _;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument as _;

/// The assembled reconciliation service. Cheap to clone; every clone shares
/// the same stores, oracle, and transport.
pub struct Service<O, M> {
    inner: Arc<ServiceInner<O, M>>,
}

struct ServiceInner<O, M> {
    messages: MessageLog,
    store: StateStore,
    snapshots: SnapshotEngine,
    router: Router<O>,
    oracle: Arc<O>,
    transport: M,
    default_entity: String,
}

impl<O, M> Clone for Service<O, M> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<O: Oracle + 'static, M: Messaging + 'static> Service<O, M> {
    pub fn new(
        pool: SqlitePool,
        mode: StorageMode,
        oracle: Arc<O>,
        transport: M,
        default_entity: String,
    ) -> Self {
        let messages = MessageLog::new(pool.clone());
        let store = StateStore::new(pool, mode);
        let snapshots = SnapshotEngine::new(store.clone(), messages.clone());
        let router = Router::new(snapshots.clone(), oracle.clone());

        Self {
            inner: Arc::new(ServiceInner {
                messages,
                store,
                snapshots,
                router,
                oracle,
                transport,
                default_entity,
            }),
        }
    }

    /// Read-side views, for callers that want queries without a directive.
    pub fn snapshots(&self) -> &SnapshotEngine {
        &self.inner.snapshots
    }

    /// Drive the transport's inbound stream until it ends or `shutdown`
    /// resolves, then stop the listener and let in-flight handlers finish.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> crate::Result<()> {
        let mut stream = self.inner.transport.start().await?;
        let mut handlers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, draining in-flight handlers");
                    break;
                }
                event = stream.next() => match event {
                    Some(event) => {
                        let service = self.clone();
                        let span = tracing::info_span!(
                            "event",
                            id = %event.id,
                            directed = event.directed,
                        );
                        handlers.spawn(
                            async move { service.handle_event(event).await }.instrument(span),
                        );
                    }
                    None => {
                        tracing::info!("inbound stream ended");
                        break;
                    }
                },
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    if let Err(error) = finished {
                        tracing::error!(%error, "event handler panicked");
                    }
                }
            }
        }

        if let Err(error) = self.inner.transport.shutdown().await {
            tracing::warn!(%error, "transport shutdown failed");
        }
        while let Some(finished) = handlers.join_next().await {
            if let Err(error) = finished {
                tracing::error!(%error, "event handler panicked");
            }
        }

        Ok(())
    }

    /// Handle one inbound event to completion.
    pub async fn handle_event(&self, event: InboundMessage) {
        if event.directed {
            self.inner.handle_directive(event).await;
        } else {
            self.inner.handle_message(event).await;
        }
    }
}

impl<O: Oracle, M: Messaging> ServiceInner<O, M> {
    /// Ingestion path. The raw message is logged first and unconditionally;
    /// nothing downstream can block it. Extraction and fact storage failures
    /// stay local to this one message, and the sender never gets a reply.
    async fn handle_message(&self, event: InboundMessage) {
        let raw = RawMessage {
            author: event.author,
            channel: event.channel,
            text: event.text,
            sent_at: event.sent_at,
        };

        if let Err(error) = self.messages.append(&raw).await {
            tracing::error!(%error, "failed to log raw message");
        }

        let raw_fact = match extract::extract(self.oracle.as_ref(), &raw.text).await {
            Ok(raw_fact) => raw_fact,
            Err(error) => {
                tracing::warn!(%error, "fact extraction failed, message kept without a fact");
                return;
            }
        };

        let Some(fact) = normalize::normalize(raw_fact, &raw) else {
            tracing::debug!("message carried no storable fact");
            return;
        };
        let Some(entity_key) = normalize::entity_key(&fact, &raw, &self.default_entity) else {
            tracing::debug!("no entity identity resolvable, fact discarded");
            return;
        };

        if let Err(error) = self.store.record(&entity_key, &fact).await {
            tracing::error!(%error, entity_key = %entity_key, "failed to store fact");
            return;
        }
        tracing::debug!(entity_key = %entity_key, "fact recorded");
    }

    /// Directive path. The sender expects an answer, so every failure mode
    /// still produces one; only delivery itself can fail, and that is logged
    /// and dropped.
    async fn handle_directive(&self, event: InboundMessage) {
        let answer = self.router.answer(&event.text).await;
        if let Err(error) = self.transport.respond(&event, &answer).await {
            tracing::error!(%error, channel = %event.channel, "reply delivery failed");
        }
    }
}

impl<O, M> std::fmt::Debug for Service<O, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").finish_non_exhaustive()
    }
}
