//! Manager facade: session lifecycle, readiness and the owner surface
//!
//! One facade owns one session. The peer's event stream drives everything:
//!
//! ```text
//!   Connected ──> version floor check ──> create + start sub-components
//!   Message ───> dispatcher.deliver
//!   Error ─────> owner on_error
//!   Disconnected ──> teardown (drain pending, dispose components, destroyed)
//! ```
//!
//! Readiness is recomputed whenever a sub-component finishes starting; the
//! first operational aggregate spawns the icon bootstrap and fires the
//! owner's `on_ready` exactly once. [`LinkManager::start`] and everything
//! spawned from it must run inside a tokio runtime.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hulink_core::{
    CompletionCallback, FunctionId, Message, ReadinessState, Request, Response, SessionEvent,
    SessionPeer, SubComponent, Version,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bootstrap;
use crate::components::{FileTransferComponent, PermissionComponent, ScreenComponent};
use crate::config::SessionConfig;
use crate::readiness::{ReadinessMonitor, Transition};
use crate::rpc::{
    BatchId, BatchListener, DispatchError, ListenerId, NotificationHandler, ResponseHandler,
    RpcDispatcher,
};

// ===== Owner surface =====

/// Facade lifecycle. Terminal once `Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    SettingUp,
    Ready,
    Limited,
    Error,
    Disposed,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManagerState::Uninitialized => "uninitialized",
            ManagerState::SettingUp => "setting_up",
            ManagerState::Ready => "ready",
            ManagerState::Limited => "limited",
            ManagerState::Error => "error",
            ManagerState::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// Lifecycle callbacks for the application owning the manager.
///
/// `on_ready` fires at most once per manager, `on_destroyed` exactly once
/// and always last. `on_error` may fire any number of times, before or
/// after `on_ready`.
pub trait ManagerEventListener: Send + Sync {
    fn on_ready(&self);
    fn on_error(&self, info: &str);
    fn on_destroyed(&self);
}

// ===== Component slots =====

/// Handles exist only between session connect and teardown; `created`
/// distinguishes "no session yet" (empty snapshot) from "a slot went
/// missing mid-session" (a `None` the monitor treats as internal error).
struct ComponentSlots {
    created: bool,
    files: Option<Arc<FileTransferComponent>>,
    permissions: Option<Arc<PermissionComponent>>,
    screen: Option<Arc<ScreenComponent>>,
}

impl ComponentSlots {
    fn empty() -> Self {
        Self {
            created: false,
            files: None,
            permissions: None,
            screen: None,
        }
    }

    fn snapshot(&self) -> Vec<Option<ReadinessState>> {
        if !self.created {
            return Vec::new();
        }
        vec![
            self.files.as_ref().map(|c| c.state()),
            self.permissions.as_ref().map(|c| c.state()),
            self.screen.as_ref().map(|c| c.state()),
        ]
    }

    fn take_all(&mut self) -> Vec<Arc<dyn SubComponent>> {
        self.created = false;
        let mut all: Vec<Arc<dyn SubComponent>> = Vec::new();
        if let Some(c) = self.files.take() {
            all.push(c);
        }
        if let Some(c) = self.permissions.take() {
            all.push(c);
        }
        if let Some(c) = self.screen.take() {
            all.push(c);
        }
        all
    }
}

// ===== Facade =====

struct ManagerInner {
    config: SessionConfig,
    peer: Arc<dyn SessionPeer>,
    dispatcher: Arc<RpcDispatcher>,
    state: RwLock<ManagerState>,
    monitor: Mutex<ReadinessMonitor>,
    components: RwLock<ComponentSlots>,
    /// Taken at teardown so `on_destroyed` is the last call it ever gets
    listener: RwLock<Option<Arc<dyn ManagerEventListener>>>,
    init_started: AtomicBool,
    disposed: AtomicBool,
}

/// Client-side session manager for a head-unit link.
///
/// Built through [`LinkManagerBuilder`](crate::config::LinkManagerBuilder);
/// drive it with [`start`](Self::start) and release it with
/// [`dispose`](Self::dispose).
pub struct LinkManager {
    inner: Arc<ManagerInner>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl LinkManager {
    pub(crate) fn from_parts(
        config: SessionConfig,
        peer: Arc<dyn SessionPeer>,
        listener: Arc<dyn ManagerEventListener>,
        notification_listeners: Vec<(FunctionId, Arc<NotificationHandler>)>,
    ) -> Self {
        let dispatcher = Arc::new(RpcDispatcher::new(peer.clone()));
        for (function, handler) in notification_listeners {
            dispatcher.add_notification_listener(function, handler);
        }
        let inner = Arc::new(ManagerInner {
            config,
            peer,
            dispatcher,
            state: RwLock::new(ManagerState::Uninitialized),
            monitor: Mutex::new(ReadinessMonitor::new()),
            components: RwLock::new(ComponentSlots::empty()),
            listener: RwLock::new(Some(listener)),
            init_started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        });
        inner.set_state(ManagerState::SettingUp);
        Self {
            inner,
            event_task: Mutex::new(None),
        }
    }

    /// Attach to the peer's event stream and begin the session lifecycle.
    ///
    /// Idempotent while a session is attached; a second call logs and
    /// returns. If the peer is already connected the connected path runs
    /// immediately instead of waiting for an event that already fired.
    pub fn start(&self) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            warn!("start ignored, manager is disposed");
            return;
        }
        let mut task = self.event_task.lock();
        if task.is_some() {
            warn!("start ignored, a session is already attached");
            return;
        }
        info!(app_id = %self.inner.config.app_id, "starting link manager");
        // subscribe before spawning so no event slips between the two
        let events = self.inner.peer.subscribe();
        *task = Some(Self::spawn_event_loop(self.inner.clone(), events));
        drop(task);

        if self.inner.peer.is_connected() {
            ManagerInner::handle_connected(&self.inner);
        }
    }

    /// Tear the manager down. Safe to call any number of times, from any
    /// thread, including from inside an owner callback.
    pub fn dispose(&self) {
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        ManagerInner::teardown(&self.inner);
    }

    fn spawn_event_loop(
        inner: Arc<ManagerInner>,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => ManagerInner::handle_event(&inner, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("session event stream closed");
                        break;
                    }
                }
            }
        })
    }

    // ===== Component accessors =====

    /// File transfer handle, `None` before the session connects or after
    /// teardown. Usable whenever the manager is Ready or Limited and the
    /// component itself is operational; access outside that window only
    /// logs, it never panics.
    pub fn file_transfer(&self) -> Option<Arc<FileTransferComponent>> {
        let component = self.inner.components.read().files.clone();
        self.warn_if_unusable(
            FileTransferComponent::NAME,
            component.as_ref().map(|c| c.state()),
        );
        component
    }

    /// Permission handle, gated like [`file_transfer`](Self::file_transfer).
    pub fn permissions(&self) -> Option<Arc<PermissionComponent>> {
        let component = self.inner.components.read().permissions.clone();
        self.warn_if_unusable(
            PermissionComponent::NAME,
            component.as_ref().map(|c| c.state()),
        );
        component
    }

    /// Screen handle, gated like [`file_transfer`](Self::file_transfer).
    pub fn screen(&self) -> Option<Arc<ScreenComponent>> {
        let component = self.inner.components.read().screen.clone();
        self.warn_if_unusable(ScreenComponent::NAME, component.as_ref().map(|c| c.state()));
        component
    }

    fn warn_if_unusable(&self, name: &'static str, component_state: Option<ReadinessState>) {
        let manager_state = *self.inner.state.read();
        if !matches!(manager_state, ManagerState::Ready | ManagerState::Limited) {
            warn!(component = name, state = %manager_state, "component accessed while the manager is not ready");
            return;
        }
        if let Some(state) = component_state {
            if !state.is_operational() {
                warn!(component = name, state = %state, "component is not usable");
            }
        }
    }

    // ===== RPC passthrough =====

    /// Fire-and-forget send; see [`RpcDispatcher::send`].
    pub async fn send(&self, message: Message) {
        self.inner.dispatcher.send(message).await;
    }

    /// Send one request and await its response; see
    /// [`RpcDispatcher::send_request`].
    pub async fn send_request(&self, request: Request) -> Result<Response, DispatchError> {
        self.inner.dispatcher.send_request(request).await
    }

    /// Ordered batch; see [`RpcDispatcher::send_sequential`].
    pub fn send_sequential(
        &self,
        messages: Vec<Message>,
        listener: Arc<dyn BatchListener>,
    ) -> Result<BatchId, DispatchError> {
        self.inner.dispatcher.send_sequential(messages, listener)
    }

    /// Parallel batch; see [`RpcDispatcher::send_concurrent`].
    pub fn send_concurrent(
        &self,
        messages: Vec<Message>,
        listener: Arc<dyn BatchListener>,
    ) -> Result<BatchId, DispatchError> {
        self.inner.dispatcher.send_concurrent(messages, listener)
    }

    pub fn add_notification_listener(
        &self,
        function: FunctionId,
        handler: Arc<NotificationHandler>,
    ) -> ListenerId {
        self.inner.dispatcher.add_notification_listener(function, handler)
    }

    pub fn remove_notification_listener(&self, function: FunctionId, id: ListenerId) -> bool {
        self.inner.dispatcher.remove_notification_listener(function, id)
    }

    pub fn add_response_listener(
        &self,
        function: FunctionId,
        handler: Arc<ResponseHandler>,
    ) -> ListenerId {
        self.inner.dispatcher.add_response_listener(function, handler)
    }

    pub fn remove_response_listener(&self, function: FunctionId, id: ListenerId) -> bool {
        self.inner.dispatcher.remove_response_listener(function, id)
    }

    // ===== Introspection =====

    pub fn state(&self) -> ManagerState {
        *self.inner.state.read()
    }

    /// Aggregate readiness over the live sub-components.
    pub fn aggregate_readiness(&self) -> ReadinessState {
        self.inner.monitor.lock().aggregate_state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.peer.is_connected()
    }

    pub fn negotiated_protocol_version(&self) -> Option<Version> {
        self.inner.peer.negotiated_protocol_version()
    }

    pub fn negotiated_rpc_version(&self) -> Option<Version> {
        self.inner.peer.negotiated_rpc_version()
    }
}

impl fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
    }
}

impl ManagerInner {
    fn set_state(&self, new: ManagerState) {
        let mut state = self.state.write();
        debug!(from = %*state, to = %new, "manager state transition");
        *state = new;
    }

    fn handle_event(inner: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Connected => Self::handle_connected(inner),
            SessionEvent::Message(message) => inner.dispatcher.deliver(message),
            SessionEvent::Error { info } => {
                warn!(%info, "session error");
                Self::notify_error(inner, &info);
            }
            SessionEvent::Disconnected { reason } => {
                info!(%reason, "session disconnected");
                Self::teardown(inner);
            }
        }
    }

    fn handle_connected(inner: &Arc<Self>) {
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        if !Self::versions_acceptable(inner) {
            // stays in SettingUp; the owner has been told why
            return;
        }
        if inner.init_started.swap(true, Ordering::SeqCst) {
            debug!("session connected again, components already initialized");
            return;
        }

        info!("session connected, starting sub-components");
        let files = Arc::new(FileTransferComponent::new(inner.dispatcher.clone()));
        let permissions = Arc::new(PermissionComponent::new(inner.dispatcher.clone()));
        let screen = Arc::new(ScreenComponent::new(inner.dispatcher.clone()));
        {
            let mut slots = inner.components.write();
            slots.created = true;
            slots.files = Some(files.clone());
            slots.permissions = Some(permissions.clone());
            slots.screen = Some(screen.clone());
        }

        // all slots are installed before any completion can observe them
        let to_start: Vec<Arc<dyn SubComponent>> = vec![files, permissions, screen];
        for component in to_start {
            let name = component.name();
            let inner = inner.clone();
            component.start(CompletionCallback::new(move |success| {
                if !success {
                    error!(component = name, "sub-component failed to start");
                }
                ManagerInner::recompute(&inner);
            }));
        }
    }

    fn versions_acceptable(inner: &Arc<Self>) -> bool {
        if let Some(version) = inner.peer.negotiated_protocol_version() {
            let floor = inner.config.minimum_protocol_version;
            if version < floor {
                let info = format!(
                    "negotiated protocol version {version} is below the configured minimum {floor}"
                );
                warn!("{info}");
                Self::notify_error(inner, &info);
                return false;
            }
        }
        if let Some(version) = inner.peer.negotiated_rpc_version() {
            let floor = inner.config.minimum_rpc_version;
            if version < floor {
                let info = format!(
                    "negotiated rpc version {version} is below the configured minimum {floor}"
                );
                warn!("{info}");
                Self::notify_error(inner, &info);
                return false;
            }
        }
        true
    }

    /// Re-derive the aggregate from the live component states. Runs under
    /// the monitor lock so concurrent completions serialize and the
    /// one-shot transitions stay one-shot; owner callbacks and the
    /// bootstrap spawn happen outside the lock.
    fn recompute(inner: &Arc<Self>) {
        if inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        let transition = {
            let mut monitor = inner.monitor.lock();
            let snapshot = inner.components.read().snapshot();
            let transition = monitor.observe(&snapshot);
            match &transition {
                Transition::Ready(ReadinessState::Limited) => {
                    inner.set_state(ManagerState::Limited)
                }
                Transition::Ready(_) => inner.set_state(ManagerState::Ready),
                Transition::Error { .. } => inner.set_state(ManagerState::Error),
                Transition::None => {}
            }
            transition
        };
        match transition {
            Transition::None => {}
            Transition::Ready(aggregate) => {
                info!(aggregate = %aggregate, "link manager ready");
                Self::launch_bootstrap(inner);
                Self::notify_ready(inner);
            }
            Transition::Error { info, internal } => {
                if internal {
                    error!(%info, "readiness aggregation failed");
                }
                Self::notify_error(inner, &info);
            }
        }
    }

    fn launch_bootstrap(inner: &Arc<Self>) {
        let Some(files) = inner.components.read().files.clone() else {
            // a ready transition with the slot empty is impossible; the
            // monitor flags missing slots as an internal error instead
            error!("bootstrap skipped, file component handle missing");
            return;
        };
        let icon = inner.config.icon.clone();
        let dispatcher = inner.dispatcher.clone();
        tokio::spawn(async move {
            bootstrap::run(icon, files, dispatcher).await;
        });
    }

    /// Idempotent. Drains in-flight requests first, then disposes the
    /// components, then releases the owner listener with a final
    /// `on_destroyed`.
    fn teardown(inner: &Arc<Self>) {
        if inner.disposed.swap(true, Ordering::SeqCst) {
            debug!("teardown already performed");
            return;
        }
        let drained = inner.dispatcher.fail_all_pending(DispatchError::Disconnected);
        if drained > 0 {
            debug!(drained, "in-flight requests failed during teardown");
        }
        for component in inner.components.write().take_all() {
            component.dispose();
        }
        inner.set_state(ManagerState::Disposed);
        let listener = inner.listener.write().take();
        if let Some(listener) = listener {
            listener.on_destroyed();
        }
        info!("link manager disposed");
    }

    fn notify_ready(inner: &Arc<Self>) {
        let listener = inner.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_ready();
        }
    }

    fn notify_error(inner: &Arc<Self>, info: &str) {
        let listener = inner.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_error(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkManagerBuilder;
    use hulink_core::peer::mock::MockSessionPeer;
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct RecordingListener {
        events: PlMutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl ManagerEventListener for RecordingListener {
        fn on_ready(&self) {
            self.events.lock().push("ready".to_string());
        }
        fn on_error(&self, info: &str) {
            self.events.lock().push(format!("error: {info}"));
        }
        fn on_destroyed(&self) {
            self.events.lock().push("destroyed".to_string());
        }
    }

    fn built() -> (LinkManager, Arc<RecordingListener>, Arc<MockSessionPeer>) {
        let listener = Arc::new(RecordingListener::default());
        let peer = Arc::new(MockSessionPeer::new());
        let manager = LinkManagerBuilder::new()
            .app_id("1234")
            .app_name("Nav Thing")
            .listener(listener.clone())
            .peer(peer.clone())
            .build()
            .unwrap();
        (manager, listener, peer)
    }

    #[tokio::test]
    async fn test_fresh_manager_is_setting_up_with_no_components() {
        let (manager, listener, _peer) = built();
        assert_eq!(manager.state(), ManagerState::SettingUp);
        assert_eq!(manager.aggregate_readiness(), ReadinessState::SettingUp);
        assert!(manager.file_transfer().is_none());
        assert!(manager.permissions().is_none());
        assert!(manager.screen().is_none());
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_dispose_before_start_destroys_exactly_once() {
        let (manager, listener, _peer) = built();
        manager.dispose();
        manager.dispose();
        assert_eq!(manager.state(), ManagerState::Disposed);
        assert_eq!(listener.events(), vec!["destroyed".to_string()]);
    }

    #[tokio::test]
    async fn test_start_after_dispose_is_refused() {
        let (manager, listener, peer) = built();
        manager.dispose();
        manager.start();
        peer.connect();
        tokio::task::yield_now().await;
        assert_eq!(manager.state(), ManagerState::Disposed);
        assert!(manager.file_transfer().is_none());
        assert_eq!(listener.events(), vec!["destroyed".to_string()]);
    }

    #[tokio::test]
    async fn test_version_floor_breach_reports_error_and_skips_init() {
        let listener = Arc::new(RecordingListener::default());
        let peer = Arc::new(MockSessionPeer::new());
        peer.set_negotiated_versions(Version::new(4, 0, 0), Version::new(6, 0, 0));
        let manager = LinkManagerBuilder::new()
            .app_id("1234")
            .app_name("Nav Thing")
            .minimum_protocol_version(Version::new(5, 0, 0))
            .listener(listener.clone())
            .peer(peer.clone())
            .build()
            .unwrap();

        peer.connect();
        manager.start();
        tokio::task::yield_now().await;

        assert_eq!(manager.state(), ManagerState::SettingUp);
        assert!(manager.file_transfer().is_none());
        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("error: negotiated protocol version 4.0.0"));
    }
}
