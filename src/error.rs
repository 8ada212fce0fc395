//! Crate-wide error taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error wrapping the per-boundary enums below.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures at the classification/reasoning oracle boundary.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Network failure, non-success HTTP status, or bounded timeout.
    /// Retryable at caller discretion; never retried inside the adapter.
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Response did not match the required shape. Not retryable; the caller
    /// treats this as "no fact".
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("missing oracle API key: set the {0} environment variable")]
    MissingApiKey(String),
}

/// Failures at the persistence boundary. Empty query results are never
/// errors; every read returns an explicit empty value instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid database path: {0}")]
    InvalidPath(String),

    #[error("corrupt state row: {0}")]
    Corrupt(String),
}

/// Failures at the chat transport boundary. Delivery is never retried at
/// this layer; redelivery is the transport's own job.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("reply delivery failed: {0}")]
    Delivery(String),

    #[error("listener error: {0}")]
    Listener(String),
}
