//! Request/response correlation and dispatch
//!
//! Every accepted request is stamped with the next transport sequence
//! number and tracked in the pending table before it reaches the peer, so
//! a response racing back immediately always finds its entry. Entries
//! leave the table exactly one way: matching response, immediate transmit
//! failure, or the disconnect drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hulink_core::{
    CorrelationId, FunctionId, Message, Notification, PeerError, Request, Response, SessionPeer,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::batch::{BatchId, BatchListener, BatchProgress, BatchUpdate};
use super::registry::{ListenerId, ListenerRegistry};
use super::DispatchError;

/// Observer for inbound notifications of one function
pub type NotificationHandler = dyn Fn(&Notification) + Send + Sync;
/// Observer for inbound responses of one function (solicited or not)
pub type ResponseHandler = dyn Fn(&Response) + Send + Sync;

/// Terminal outcome of one tracked request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// The head unit answered (success or failure result)
    Response(Response),
    /// No response will ever arrive
    Failed(DispatchError),
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Response(r) if r.is_success())
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            RequestOutcome::Response(r) => Some(r),
            RequestOutcome::Failed(_) => None,
        }
    }
}

/// One-shot continuation fed when the outcome of a request is known
type ResponseSink = Box<dyn FnOnce(RequestOutcome) + Send>;

struct PendingRequest {
    sink: Option<ResponseSink>,
}

/// Correlates outbound requests with inbound responses over one peer.
///
/// Shared behind an `Arc`; the batch send paths spawn driver tasks that
/// keep the dispatcher alive for the lifetime of the job.
pub struct RpcDispatcher {
    peer: Arc<dyn SessionPeer>,
    next_sequence: AtomicU32,
    pending: Mutex<HashMap<CorrelationId, PendingRequest>>,
    notification_listeners: ListenerRegistry<NotificationHandler>,
    response_listeners: ListenerRegistry<ResponseHandler>,
}

impl RpcDispatcher {
    pub fn new(peer: Arc<dyn SessionPeer>) -> Self {
        Self {
            peer,
            next_sequence: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
            notification_listeners: ListenerRegistry::new(),
            response_listeners: ListenerRegistry::new(),
        }
    }

    // ===== Outbound =====

    /// Fire-and-forget send.
    ///
    /// Only requests have a network effect; responses and notifications
    /// handed in here are dropped without an error. Transmit failures are
    /// logged, not surfaced.
    pub async fn send(&self, message: Message) {
        let request = match message {
            Message::Request(request) => request,
            other => {
                debug!(function = %other.function(), "send: dropping non-request message");
                return;
            }
        };
        let (key, result) = self.dispatch(request, None).await;
        match result {
            Ok(()) => debug!(correlation = %key, "request transmitted"),
            Err(e) => debug!(correlation = %key, error = %e, "fire-and-forget request failed"),
        }
    }

    /// Send one request and wait for its outcome.
    ///
    /// Resolves on the matching response, a synchronously detected
    /// transmit failure, or the disconnect drain. There is no timeout at
    /// this layer; the peer answers eventually or the session ends.
    pub async fn send_request(&self, request: Request) -> Result<Response, DispatchError> {
        let (_key, outcome) = self.execute(request).await;
        match outcome {
            RequestOutcome::Response(response) => Ok(response),
            RequestOutcome::Failed(error) => Err(error),
        }
    }

    /// Send a batch strictly in order: item i+1 is dispatched only after
    /// item i's outcome has been delivered to the listener. A failing item
    /// does not stop the batch; it only clears the aggregate success flag.
    pub fn send_sequential(
        self: &Arc<Self>,
        messages: Vec<Message>,
        listener: Arc<dyn BatchListener>,
    ) -> Result<BatchId, DispatchError> {
        let requests = Self::validate_batch(messages)?;
        let id = BatchId::new();
        let progress = BatchProgress::new(id, requests.len(), listener);
        let dispatcher = self.clone();
        info!(batch = %id, items = requests.len(), "sequential batch accepted");
        tokio::spawn(async move {
            for (index, request) in requests.into_iter().enumerate() {
                let function = request.function;
                let (key, outcome) = dispatcher.execute(request).await;
                progress.record(BatchUpdate {
                    index,
                    function,
                    correlation: key.sequence,
                    outcome,
                });
            }
        });
        Ok(id)
    }

    /// Send a batch with maximum parallelism: every item is stamped and
    /// transmitted without waiting for any response; outcomes reach the
    /// listener in whatever order the head unit answers.
    pub fn send_concurrent(
        self: &Arc<Self>,
        messages: Vec<Message>,
        listener: Arc<dyn BatchListener>,
    ) -> Result<BatchId, DispatchError> {
        let requests = Self::validate_batch(messages)?;
        let id = BatchId::new();
        let progress = BatchProgress::new(id, requests.len(), listener);
        let dispatcher = self.clone();
        info!(batch = %id, items = requests.len(), "concurrent batch accepted");
        tokio::spawn(async move {
            for (index, mut request) in requests.into_iter().enumerate() {
                let function = request.function;
                let key = dispatcher.stamp(&mut request);
                let progress = progress.clone();
                let sink: ResponseSink = Box::new(move |outcome| {
                    progress.record(BatchUpdate {
                        index,
                        function,
                        correlation: key.sequence,
                        outcome,
                    });
                });
                // outcome reaches the sink either way; nothing to do here
                let _ = dispatcher.transmit_tracked(request, key, Some(sink)).await;
            }
        });
        Ok(id)
    }

    /// A batch must be non-empty and all requests; anything else rejects
    /// the job wholesale before a single item is transmitted.
    fn validate_batch(messages: Vec<Message>) -> Result<Vec<Request>, DispatchError> {
        if messages.is_empty() {
            return Err(DispatchError::MalformedBatch("batch is empty".to_string()));
        }
        let mut requests = Vec::with_capacity(messages.len());
        for (index, message) in messages.into_iter().enumerate() {
            match message {
                Message::Request(request) => requests.push(request),
                Message::Response(_) => {
                    return Err(DispatchError::MalformedBatch(format!(
                        "item {} is a response, only requests are allowed",
                        index
                    )));
                }
                Message::Notification(_) => {
                    return Err(DispatchError::MalformedBatch(format!(
                        "item {} is a notification, only requests are allowed",
                        index
                    )));
                }
            }
        }
        Ok(requests)
    }

    /// Send with a oneshot continuation and wait for it
    async fn execute(&self, request: Request) -> (CorrelationId, RequestOutcome) {
        let (tx, rx) = oneshot::channel();
        let sink: ResponseSink = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        let (key, _result) = self.dispatch(request, Some(sink)).await;
        // dispatch feeds the sink on immediate failures, so the channel
        // only closes unresolved if the dispatcher is dropped mid-flight
        match rx.await {
            Ok(outcome) => (key, outcome),
            Err(_) => (key, RequestOutcome::Failed(DispatchError::Disconnected)),
        }
    }

    fn stamp(&self, request: &mut Request) -> CorrelationId {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        request.correlation = Some(sequence);
        CorrelationId::new(request.function, sequence)
    }

    async fn dispatch(
        &self,
        mut request: Request,
        sink: Option<ResponseSink>,
    ) -> (CorrelationId, Result<(), DispatchError>) {
        let key = self.stamp(&mut request);
        let result = self.transmit_tracked(request, key, sink).await;
        (key, result)
    }

    /// Track then transmit an already-stamped request. On failure the
    /// entry is removed again and the sink (when present) receives the
    /// failure before this returns.
    async fn transmit_tracked(
        &self,
        request: Request,
        key: CorrelationId,
        sink: Option<ResponseSink>,
    ) -> Result<(), DispatchError> {
        if !self.peer.is_connected() {
            debug!(correlation = %key, "dispatch rejected: not connected");
            if let Some(sink) = sink {
                sink(RequestOutcome::Failed(DispatchError::NotConnected));
            }
            return Err(DispatchError::NotConnected);
        }

        self.pending.lock().insert(key, PendingRequest { sink });

        match self.peer.transmit(Message::Request(request)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error = match e {
                    PeerError::NotConnected => DispatchError::NotConnected,
                    PeerError::TransmitFailed(msg) => DispatchError::Transmit(msg),
                };
                warn!(correlation = %key, error = %error, "transmit failed");
                // a racing response may have consumed the entry already
                if let Some(entry) = self.pending.lock().remove(&key) {
                    if let Some(sink) = entry.sink {
                        sink(RequestOutcome::Failed(error.clone()));
                    }
                }
                Err(error)
            }
        }
    }

    // ===== Inbound =====

    /// Deliver one inbound message from the session peer
    pub fn deliver(&self, message: Message) {
        match message {
            Message::Response(response) => self.deliver_response(response),
            Message::Notification(notification) => self.deliver_notification(notification),
            Message::Request(request) => {
                // head-unit-originated requests are the session layer's
                // business, not this runtime's
                warn!(function = %request.function, "ignoring inbound request");
            }
        }
    }

    fn deliver_response(&self, response: Response) {
        let key = response.correlation_id();
        let entry = self.pending.lock().remove(&key);
        match entry {
            Some(PendingRequest { sink: Some(sink) }) => {
                debug!(correlation = %key, result = %response.result, "response settled pending request");
                sink(RequestOutcome::Response(response.clone()));
            }
            Some(PendingRequest { sink: None }) => {
                debug!(correlation = %key, result = %response.result, "response consumed, no continuation");
            }
            None => {
                debug!(correlation = %key, "unsolicited response");
            }
        }
        for handler in self.response_listeners.collect(response.function) {
            handler(&response);
        }
    }

    fn deliver_notification(&self, notification: Notification) {
        let handlers = self.notification_listeners.collect(notification.function);
        if handlers.is_empty() {
            debug!(function = %notification.function, "notification without listeners");
            return;
        }
        for handler in handlers {
            handler(&notification);
        }
    }

    /// Fail every pending request, e.g. when the session disconnects.
    ///
    /// Each still-pending continuation receives the failure exactly once;
    /// fire-and-forget entries are discarded. Returns the number drained.
    pub fn fail_all_pending(&self, error: DispatchError) -> usize {
        let drained: Vec<(CorrelationId, PendingRequest)> =
            self.pending.lock().drain().collect();
        let count = drained.len();
        if count > 0 {
            info!(count, error = %error, "draining pending requests");
        }
        for (key, entry) in drained {
            debug!(correlation = %key, "pending request failed by drain");
            if let Some(sink) = entry.sink {
                sink(RequestOutcome::Failed(error.clone()));
            }
        }
        count
    }

    // ===== Listener registries =====

    pub fn add_notification_listener(
        &self,
        function: FunctionId,
        handler: Arc<NotificationHandler>,
    ) -> ListenerId {
        self.notification_listeners.add(function, handler)
    }

    pub fn remove_notification_listener(&self, function: FunctionId, id: ListenerId) -> bool {
        self.notification_listeners.remove(function, id)
    }

    pub fn add_response_listener(
        &self,
        function: FunctionId,
        handler: Arc<ResponseHandler>,
    ) -> ListenerId {
        self.response_listeners.add(function, handler)
    }

    pub fn remove_response_listener(&self, function: FunctionId, id: ListenerId) -> bool {
        self.response_listeners.remove(function, id)
    }

    /// Number of requests currently awaiting a response
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hulink_core::peer::mock::MockSessionPeer;
    use hulink_core::{ResultCode, SessionEvent, Version};
    use serde_json::{json, Value};
    use tokio::sync::broadcast;

    fn dispatcher_over(peer: Arc<MockSessionPeer>) -> Arc<RpcDispatcher> {
        Arc::new(RpcDispatcher::new(peer))
    }

    fn response_for(request: &Request, result: ResultCode) -> Response {
        Response {
            function: request.function,
            correlation: request.correlation.unwrap(),
            result,
            info: None,
            payload: Value::Null,
        }
    }

    #[tokio::test]
    async fn test_send_stamps_and_tracks() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer.clone());

        dispatcher
            .send(Message::request(FunctionId::Speak, json!({"ttsChunks": ["hi"]})))
            .await;

        let sent = peer.sent_requests(FunctionId::Speak);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].correlation, Some(1));
        assert_eq!(dispatcher.pending_len(), 1);

        // second request gets the next sequence
        dispatcher
            .send(Message::request(FunctionId::Speak, Value::Null))
            .await;
        assert_eq!(
            peer.sent_requests(FunctionId::Speak)[1].correlation,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_send_ignores_non_requests() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer.clone());

        dispatcher
            .send(Message::notification(FunctionId::OnHmiStatus, Value::Null))
            .await;
        dispatcher
            .send(Message::Response(Response {
                function: FunctionId::Show,
                correlation: 9,
                result: ResultCode::Success,
                info: None,
                payload: Value::Null,
            }))
            .await;

        assert!(peer.sent().is_empty());
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_send_request_resolves_on_matching_response() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer.clone());

        let task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .send_request(Request::new(FunctionId::ListFiles, Value::Null))
                    .await
            })
        };

        peer.wait_for_sent(1).await;
        let request = peer.sent_requests(FunctionId::ListFiles).remove(0);

        // a response for a different function but the same sequence must
        // not settle the entry
        dispatcher.deliver(Message::Response(Response {
            function: FunctionId::Show,
            correlation: request.correlation.unwrap(),
            result: ResultCode::Success,
            info: None,
            payload: Value::Null,
        }));
        assert_eq!(dispatcher.pending_len(), 1);

        dispatcher.deliver(Message::Response(response_for(&request, ResultCode::Success)));
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.result, ResultCode::Success);
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_send_request_fails_synchronously_when_disconnected() {
        let peer = Arc::new(MockSessionPeer::new());
        let dispatcher = dispatcher_over(peer.clone());

        let err = dispatcher
            .send_request(Request::new(FunctionId::Show, Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::NotConnected);
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(peer.sent().is_empty());
    }

    struct FailingPeer {
        events: broadcast::Sender<SessionEvent>,
    }

    impl FailingPeer {
        fn new() -> Self {
            let (events, _) = broadcast::channel(8);
            Self { events }
        }
    }

    #[async_trait]
    impl SessionPeer for FailingPeer {
        async fn transmit(&self, _message: Message) -> Result<(), PeerError> {
            Err(PeerError::TransmitFailed("wire fell off".to_string()))
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
            self.events.subscribe()
        }
        fn negotiated_protocol_version(&self) -> Option<Version> {
            Some(Version::new(5, 1, 0))
        }
        fn negotiated_rpc_version(&self) -> Option<Version> {
            Some(Version::new(7, 1, 0))
        }
    }

    #[tokio::test]
    async fn test_transmit_failure_untracks_and_fails_continuation() {
        let dispatcher = Arc::new(RpcDispatcher::new(Arc::new(FailingPeer::new())));

        let err = dispatcher
            .send_request(Request::new(FunctionId::Show, Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::Transmit("wire fell off".to_string()));
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_pending_drains_each_exactly_once() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer.clone());

        let mut tasks = Vec::new();
        for function in [FunctionId::Show, FunctionId::Speak, FunctionId::Alert] {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher.send_request(Request::new(function, Value::Null)).await
            }));
        }
        peer.wait_for_sent(3).await;
        assert_eq!(dispatcher.pending_len(), 3);

        let drained = dispatcher.fail_all_pending(DispatchError::Disconnected);
        assert_eq!(drained, 3);
        assert_eq!(dispatcher.pending_len(), 0);
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap_err(), DispatchError::Disconnected);
        }

        // empty drain is a no-op
        assert_eq!(dispatcher.fail_all_pending(DispatchError::Disconnected), 0);
    }

    #[tokio::test]
    async fn test_unsolicited_response_reaches_type_listeners() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        dispatcher.add_response_listener(
            FunctionId::GenericResponse,
            Arc::new(move |response: &Response| seen2.lock().push(response.correlation)),
        );

        dispatcher.deliver(Message::Response(Response {
            function: FunctionId::GenericResponse,
            correlation: 999,
            result: ResultCode::Success,
            info: None,
            payload: Value::Null,
        }));
        assert_eq!(*seen.lock(), vec![999]);
    }

    #[tokio::test]
    async fn test_notification_listeners_fire_in_order_and_removal_sticks() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer);

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        let first = dispatcher.add_notification_listener(
            FunctionId::OnCommand,
            Arc::new(move |_: &Notification| o1.lock().push("first")),
        );
        dispatcher.add_notification_listener(
            FunctionId::OnCommand,
            Arc::new(move |_: &Notification| o2.lock().push("second")),
        );

        dispatcher.deliver(Message::notification(FunctionId::OnCommand, Value::Null));
        assert_eq!(*order.lock(), vec!["first", "second"]);

        assert!(dispatcher.remove_notification_listener(FunctionId::OnCommand, first));
        dispatcher.deliver(Message::notification(FunctionId::OnCommand, Value::Null));
        assert_eq!(*order.lock(), vec!["first", "second", "second"]);
    }

    #[tokio::test]
    async fn test_malformed_batches_rejected_wholesale() {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = dispatcher_over(peer.clone());

        struct Ignore;
        impl BatchListener for Ignore {
            fn on_update(&self, _update: BatchUpdate) {}
            fn on_finished(&self, _all_succeeded: bool) {}
        }

        let err = dispatcher
            .send_sequential(Vec::new(), Arc::new(Ignore))
            .unwrap_err();
        assert!(matches!(err, DispatchError::MalformedBatch(_)));

        // a valid prefix must not leak out before validation fails
        let mixed = vec![
            Message::request(FunctionId::Show, Value::Null),
            Message::notification(FunctionId::OnHmiStatus, Value::Null),
        ];
        let err = dispatcher
            .send_concurrent(mixed, Arc::new(Ignore))
            .unwrap_err();
        assert!(matches!(err, DispatchError::MalformedBatch(_)));

        assert!(peer.sent().is_empty());
        assert_eq!(dispatcher.pending_len(), 0);
    }
}
