//! RPC dispatch layer
//!
//! Correlates outbound requests with inbound responses, fans notifications
//! out to registered listeners and drives batch jobs. There is deliberately
//! no timeout machinery here: the session peer owns timeout policy and
//! synthesizes TIMED_OUT responses, so every pending entry is settled by a
//! response, an immediate transmit failure or the disconnect drain.

mod batch;
mod dispatcher;
mod registry;

pub use batch::{BatchId, BatchListener, BatchUpdate};
pub use dispatcher::{NotificationHandler, RequestOutcome, ResponseHandler, RpcDispatcher};
pub use registry::ListenerId;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Not connected to the head unit")]
    NotConnected,

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Session disconnected before a response arrived")]
    Disconnected,

    #[error("Transmit failed: {0}")]
    Transmit(String),
}
