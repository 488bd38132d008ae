//! Screen state: foreground level tracking and basic text templating

use std::sync::Arc;

use hulink_core::{
    CompletionCallback, FunctionId, HmiLevel, Notification, ReadinessState, Request, ResultCode,
    SubComponent,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::rpc::{DispatchError, ListenerId, RpcDispatcher};

#[derive(Debug, Clone, Default)]
struct TextFields {
    main_field_1: Option<String>,
    main_field_2: Option<String>,
}

/// Follows the head unit's foreground grants and renders the two main
/// text fields. Field setters only stage state; `apply` sends one Show
/// request with everything staged so far.
pub struct ScreenComponent {
    dispatcher: Arc<RpcDispatcher>,
    state: Arc<RwLock<ReadinessState>>,
    hmi_level: Arc<RwLock<Option<HmiLevel>>>,
    fields: RwLock<TextFields>,
    listener_id: Mutex<Option<ListenerId>>,
}

impl ScreenComponent {
    pub const NAME: &'static str = "screen";

    pub fn new(dispatcher: Arc<RpcDispatcher>) -> Self {
        Self {
            dispatcher,
            state: Arc::new(RwLock::new(ReadinessState::SettingUp)),
            hmi_level: Arc::new(RwLock::new(None)),
            fields: RwLock::new(TextFields::default()),
            listener_id: Mutex::new(None),
        }
    }

    /// Foreground level last reported by the head unit; None until the
    /// first status notification arrives
    pub fn hmi_level(&self) -> Option<HmiLevel> {
        *self.hmi_level.read()
    }

    pub fn set_main_field_1(&self, text: impl Into<String>) {
        self.fields.write().main_field_1 = Some(text.into());
    }

    pub fn set_main_field_2(&self, text: impl Into<String>) {
        self.fields.write().main_field_2 = Some(text.into());
    }

    /// Send the staged fields as one Show request
    pub async fn apply(&self) -> Result<(), ScreenError> {
        let fields = self.fields.read().clone();
        let mut payload = serde_json::Map::new();
        if let Some(text) = fields.main_field_1 {
            payload.insert("mainField1".to_string(), json!(text));
        }
        if let Some(text) = fields.main_field_2 {
            payload.insert("mainField2".to_string(), json!(text));
        }

        let request = Request::new(FunctionId::Show, Value::Object(payload));
        let response = self.dispatcher.send_request(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ScreenError::Rejected {
                result: response.result,
                info: response.info,
            })
        }
    }
}

impl SubComponent for ScreenComponent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> ReadinessState {
        *self.state.read()
    }

    fn start(&self, completion: CompletionCallback) {
        let hmi_level = self.hmi_level.clone();
        let id = self.dispatcher.add_notification_listener(
            FunctionId::OnHmiStatus,
            Arc::new(move |notification: &Notification| {
                let Some(level) = notification
                    .payload
                    .get("hmiLevel")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<HmiLevel>().ok())
                else {
                    warn!("hmi status without a parsable level");
                    return;
                };
                debug!(level = %level, "hmi level changed");
                *hmi_level.write() = Some(level);
            }),
        );
        *self.listener_id.lock() = Some(id);
        *self.state.write() = ReadinessState::Ready;
        completion.complete(true);
    }

    fn dispose(&self) {
        if let Some(id) = self.listener_id.lock().take() {
            self.dispatcher
                .remove_notification_listener(FunctionId::OnHmiStatus, id);
        }
        *self.hmi_level.write() = None;
        debug!(component = Self::NAME, "disposed");
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScreenError {
    #[error("Show rejected: {result}")]
    Rejected {
        result: ResultCode,
        info: Option<String>,
    },

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hulink_core::peer::mock::MockSessionPeer;
    use hulink_core::{Message, SessionEvent, SessionPeer};
    use tokio::sync::oneshot;

    async fn started() -> (Arc<MockSessionPeer>, Arc<RpcDispatcher>, ScreenComponent) {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = Arc::new(RpcDispatcher::new(peer.clone()));

        // forward auto-responses into the dispatcher
        let mut rx = peer.subscribe();
        let pump_dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let SessionEvent::Message(message) = event {
                    pump_dispatcher.deliver(message);
                }
            }
        });

        let screen = ScreenComponent::new(dispatcher.clone());
        let (tx, done) = oneshot::channel();
        screen.start(CompletionCallback::new(move |ok| {
            let _ = tx.send(ok);
        }));
        assert!(done.await.unwrap());
        (peer, dispatcher, screen)
    }

    #[tokio::test]
    async fn test_tracks_hmi_level() {
        let (_peer, dispatcher, screen) = started().await;
        assert_eq!(screen.hmi_level(), None);

        dispatcher.deliver(Message::notification(
            FunctionId::OnHmiStatus,
            json!({"hmiLevel": "FULL"}),
        ));
        assert_eq!(screen.hmi_level(), Some(HmiLevel::Full));

        dispatcher.deliver(Message::notification(
            FunctionId::OnHmiStatus,
            json!({"hmiLevel": "BACKGROUND"}),
        ));
        assert_eq!(screen.hmi_level(), Some(HmiLevel::Background));

        // unknown levels leave the last good value
        dispatcher.deliver(Message::notification(
            FunctionId::OnHmiStatus,
            json!({"hmiLevel": "SIDEWAYS"}),
        ));
        assert_eq!(screen.hmi_level(), Some(HmiLevel::Background));
    }

    #[tokio::test]
    async fn test_apply_sends_staged_fields() {
        let (peer, _dispatcher, screen) = started().await;
        peer.respond_to(FunctionId::Show, ResultCode::Success);

        screen.set_main_field_1("Now Playing");
        screen.set_main_field_2("Track 7");
        screen.apply().await.unwrap();

        let sent = peer.sent_requests(FunctionId::Show);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload["mainField1"], "Now Playing");
        assert_eq!(sent[0].payload["mainField2"], "Track 7");
    }

    #[tokio::test]
    async fn test_rejected_show_surfaces_result() {
        let (peer, _dispatcher, screen) = started().await;
        peer.respond_to(FunctionId::Show, ResultCode::Disallowed);

        screen.set_main_field_1("hi");
        match screen.apply().await.unwrap_err() {
            ScreenError::Rejected { result, .. } => assert_eq!(result, ResultCode::Disallowed),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
