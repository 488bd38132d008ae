//! Permission tracking fed by head-unit policy notifications

use std::collections::HashMap;
use std::sync::Arc;

use hulink_core::{CompletionCallback, FunctionId, Notification, ReadinessState, SubComponent};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::rpc::{ListenerId, RpcDispatcher};

/// Mirrors which functions the head unit currently allows.
///
/// The head unit pushes policy changes as notifications; nothing is polled.
/// A function never mentioned by the head unit counts as not allowed.
pub struct PermissionComponent {
    dispatcher: Arc<RpcDispatcher>,
    state: Arc<RwLock<ReadinessState>>,
    granted: Arc<RwLock<HashMap<FunctionId, bool>>>,
    listener_id: Mutex<Option<ListenerId>>,
}

impl PermissionComponent {
    pub const NAME: &'static str = "permissions";

    pub fn new(dispatcher: Arc<RpcDispatcher>) -> Self {
        Self {
            dispatcher,
            state: Arc::new(RwLock::new(ReadinessState::SettingUp)),
            granted: Arc::new(RwLock::new(HashMap::new())),
            listener_id: Mutex::new(None),
        }
    }

    /// Whether the head unit currently allows this function
    pub fn is_allowed(&self, function: FunctionId) -> bool {
        self.granted.read().get(&function).copied().unwrap_or(false)
    }

    /// Functions with a known policy entry
    pub fn known_functions(&self) -> Vec<FunctionId> {
        self.granted.read().keys().copied().collect()
    }
}

fn parse_permissions(payload: &Value) -> Vec<(FunctionId, bool)> {
    let Some(items) = payload.get("permissions").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let function = item.get("function")?.as_str()?.parse().ok()?;
            let allowed = item.get("allowed")?.as_bool()?;
            Some((function, allowed))
        })
        .collect()
}

impl SubComponent for PermissionComponent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> ReadinessState {
        *self.state.read()
    }

    fn start(&self, completion: CompletionCallback) {
        let granted = self.granted.clone();
        let id = self.dispatcher.add_notification_listener(
            FunctionId::OnPermissionsChange,
            Arc::new(move |notification: &Notification| {
                let updates = parse_permissions(&notification.payload);
                debug!(count = updates.len(), "permission change received");
                let mut map = granted.write();
                for (function, allowed) in updates {
                    map.insert(function, allowed);
                }
            }),
        );
        *self.listener_id.lock() = Some(id);
        *self.state.write() = ReadinessState::Ready;
        completion.complete(true);
    }

    fn dispose(&self) {
        if let Some(id) = self.listener_id.lock().take() {
            self.dispatcher
                .remove_notification_listener(FunctionId::OnPermissionsChange, id);
        }
        self.granted.write().clear();
        debug!(component = Self::NAME, "disposed");
    }
}
