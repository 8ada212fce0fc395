//! opsbot distills free-text team chat into a queryable per-entity
//! operations board: what each client or editor is working on, who is
//! blocked, and when each state last changed.
//!
//! The pipeline: an inbound message is logged verbatim, classified by an
//! external oracle into a raw fact, normalized against a closed status
//! vocabulary, and reconciled into the state store under last-write-wins
//! semantics. Directives addressed to the bot query the resulting snapshot.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod messaging;
pub mod normalize;
pub mod oracle;
pub mod reply;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod state;

pub use error::{Error, Result};
pub use messaging::{InboundMessage, InboundStream, Messaging};
