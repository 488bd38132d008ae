//! Scripted in-process session peer for demos and tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{broadcast, Notify};

use super::{DisconnectReason, PeerError, SessionEvent, SessionPeer};
use crate::message::{FunctionId, Message, Request, Response, ResultCode};
use crate::version::Version;

/// Scripted reply the mock emits when a matching request is transmitted
#[derive(Debug, Clone)]
struct MockReply {
    result: ResultCode,
    info: Option<String>,
    payload: Value,
}

/// In-process [`SessionPeer`] with scripted responses.
///
/// Starts disconnected; `connect()` raises the session and emits the
/// Connected event. Transmitted messages are recorded for assertions, and
/// requests whose function has a scripted reply get a matching response
/// echoed back through the event channel.
pub struct MockSessionPeer {
    connected: AtomicBool,
    events_tx: broadcast::Sender<SessionEvent>,
    /// Scripted replies per request function
    replies: RwLock<HashMap<FunctionId, MockReply>>,
    /// Transcript of everything handed to `transmit`
    sent: Mutex<Vec<Message>>,
    sent_notify: Notify,
    versions: RwLock<Option<(Version, Version)>>,
}

impl MockSessionPeer {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            connected: AtomicBool::new(false),
            events_tx,
            replies: RwLock::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            versions: RwLock::new(None),
        }
    }

    /// Raise the session. Keeps previously scripted versions if set,
    /// otherwise negotiates a current-generation default pair.
    pub fn connect(&self) {
        if self.versions.read().is_none() {
            *self.versions.write() = Some((Version::new(5, 1, 0), Version::new(7, 1, 0)));
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events_tx.send(SessionEvent::Connected);
    }

    /// Drop the session and emit the Disconnected event
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events_tx.send(SessionEvent::Disconnected { reason });
    }

    /// Emit a non-fatal session error
    pub fn emit_error(&self, info: impl Into<String>) {
        let _ = self.events_tx.send(SessionEvent::Error { info: info.into() });
    }

    /// Inject an inbound message (head unit -> application)
    pub fn deliver(&self, message: Message) {
        let _ = self.events_tx.send(SessionEvent::Message(message));
    }

    /// Override the versions reported after the next `connect()`
    pub fn set_negotiated_versions(&self, protocol: Version, rpc: Version) {
        *self.versions.write() = Some((protocol, rpc));
    }

    /// Script an empty-payload reply for a request function
    pub fn respond_to(&self, function: FunctionId, result: ResultCode) {
        self.respond_with(function, result, Value::Null);
    }

    /// Script a reply carrying a payload for a request function
    pub fn respond_with(&self, function: FunctionId, result: ResultCode, payload: Value) {
        self.replies.write().insert(
            function,
            MockReply {
                result,
                info: None,
                payload,
            },
        );
    }

    /// Forget a scripted reply so later requests stay pending
    pub fn drop_reply(&self, function: FunctionId) {
        self.replies.write().remove(&function);
    }

    /// Everything transmitted so far
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Functions of transmitted messages, in transmit order
    pub fn sent_functions(&self) -> Vec<FunctionId> {
        self.sent.lock().iter().map(|m| m.function()).collect()
    }

    /// Transmitted requests for one function, in transmit order
    pub fn sent_requests(&self, function: FunctionId) -> Vec<Request> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                Message::Request(r) if r.function == function => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Wait until at least `count` messages have been transmitted
    pub async fn wait_for_sent(&self, count: usize) {
        loop {
            let notified = self.sent_notify.notified();
            if self.sent.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn reply_for(&self, request: &Request) -> Option<Response> {
        let replies = self.replies.read();
        let reply = replies.get(&request.function)?;
        Some(Response {
            function: request.function,
            correlation: request.correlation.unwrap_or(0),
            result: reply.result,
            info: reply.info.clone(),
            payload: reply.payload.clone(),
        })
    }
}

impl Default for MockSessionPeer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionPeer for MockSessionPeer {
    async fn transmit(&self, message: Message) -> Result<(), PeerError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(PeerError::NotConnected);
        }

        let reply = match &message {
            Message::Request(request) => self.reply_for(request),
            _ => None,
        };

        tracing::debug!(function = %message.function(), "mock peer: transmitted");
        self.sent.lock().push(message);
        self.sent_notify.notify_waiters();

        if let Some(response) = reply {
            let _ = self.events_tx.send(SessionEvent::Message(Message::Response(response)));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    fn negotiated_protocol_version(&self) -> Option<Version> {
        self.versions.read().map(|(protocol, _)| protocol)
    }

    fn negotiated_rpc_version(&self) -> Option<Version> {
        self.versions.read().map(|(_, rpc)| rpc)
    }
}
