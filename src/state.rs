//! Durable state: the raw message log, the fact stores, and the domain
//! types they share.

mod facts;
mod messages;
mod types;

pub use facts::{CurrentStateTable, OperationsLog, StateStore};
pub use messages::MessageLog;
pub use types::{Fact, RawMessage, StateRecord, Status};
