//! Session peer layer
//!
//! The peer owns everything below the coordination layer: transport framing,
//! session establishment, version negotiation and per-request timeout policy.
//! A peer that gives up on a request synthesizes a `TIMED_OUT` response; the
//! runtime above never assumes a maximum wait on its own.

pub mod mock;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::message::Message;
use crate::version::Version;

/// Why an established session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Underlying transport dropped
    TransportClosed,
    /// Head unit ended the session
    EndedByPeer,
    /// Local application asked for the teardown
    ApplicationRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DisconnectReason::TransportClosed => "transport closed",
            DisconnectReason::EndedByPeer => "ended by peer",
            DisconnectReason::ApplicationRequested => "application requested",
        };
        f.write_str(s)
    }
}

/// Event pushed from the peer up into the coordination layer
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session established, versions negotiated
    Connected,
    /// Session gone; every in-flight request must be failed by the receiver
    Disconnected { reason: DisconnectReason },
    /// Session-level fault that did not end the session
    Error { info: String },
    /// Inbound message from the head unit
    Message(Message),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("No active session with the head unit")]
    NotConnected,

    #[error("Transmit failed: {0}")]
    TransmitFailed(String),
}

/// Interface to an established (or establishing) head-unit session.
///
/// Implementations multiplex one connection; `transmit` accepts any message
/// kind, and inbound traffic plus lifecycle changes arrive through the
/// broadcast channel handed out by `subscribe`.
#[async_trait]
pub trait SessionPeer: Send + Sync {
    /// Hand a message to the session for transmission
    async fn transmit(&self, message: Message) -> Result<(), PeerError>;

    /// Whether a session is currently established
    fn is_connected(&self) -> bool;

    /// Subscribe to session events (lifecycle + inbound messages)
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Protocol version agreed with the head unit, once negotiated
    fn negotiated_protocol_version(&self) -> Option<Version>;

    /// RPC spec version agreed with the head unit, once negotiated
    fn negotiated_rpc_version(&self) -> Option<Version>;
}
