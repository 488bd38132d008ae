//! Post-ready bootstrap: bring the configured app icon to the head unit
//!
//! Runs once, immediately after the first Ready or Limited transition.
//! Failures here are cosmetic by definition: a missing icon never affects
//! readiness, so every error path ends in a log line, not a state change.

use std::sync::Arc;

use hulink_core::{FunctionId, IconAsset, Message, SubComponent};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::components::FileTransferComponent;
use crate::rpc::RpcDispatcher;

/// Upload the icon if the head unit does not hold it yet, then apply it.
///
/// Skips the upload round-trip when the file is already present or when
/// the file component is unusable; an upload failure suppresses only the
/// apply message.
pub(crate) async fn run(
    icon: Option<IconAsset>,
    files: Arc<FileTransferComponent>,
    dispatcher: Arc<RpcDispatcher>,
) {
    let Some(icon) = icon else {
        debug!("no app icon configured, nothing to bootstrap");
        return;
    };

    if files.state().is_operational() && !files.has_uploaded(&icon.name) {
        info!(file = %icon.name, bytes = icon.len(), "uploading app icon");
        if let Err(e) = files.upload(&icon).await {
            warn!(file = %icon.name, error = %e, "app icon upload failed, icon stays unset");
            return;
        }
    } else {
        debug!(file = %icon.name, "skipping upload, icon already present or files unusable");
    }

    dispatcher
        .send(Message::request(
            FunctionId::SetAppIcon,
            json!({"fileName": icon.name}),
        ))
        .await;
    info!(file = %icon.name, "app icon applied");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hulink_core::peer::mock::MockSessionPeer;
    use hulink_core::{CompletionCallback, ResultCode, SessionEvent, SessionPeer};
    use tokio::sync::oneshot;

    struct Harness {
        peer: Arc<MockSessionPeer>,
        dispatcher: Arc<RpcDispatcher>,
        files: Arc<FileTransferComponent>,
    }

    fn harness() -> Harness {
        let peer = Arc::new(MockSessionPeer::new());
        peer.connect();
        let dispatcher = Arc::new(RpcDispatcher::new(peer.clone()));

        let mut rx = peer.subscribe();
        let pump = dispatcher.clone();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let SessionEvent::Message(message) = event {
                    pump.deliver(message);
                }
            }
        });

        let files = Arc::new(FileTransferComponent::new(dispatcher.clone()));
        Harness {
            peer,
            dispatcher,
            files,
        }
    }

    async fn start_files(harness: &Harness, listing: serde_json::Value) {
        harness
            .peer
            .respond_with(FunctionId::ListFiles, ResultCode::Success, listing);
        let (tx, rx) = oneshot::channel();
        harness.files.start(CompletionCallback::new(move |ok| {
            let _ = tx.send(ok);
        }));
        assert!(rx.await.unwrap());
        harness.peer.clear_sent();
    }

    fn icon() -> IconAsset {
        IconAsset::png("app_icon.png", Bytes::from_static(b"\x89PNG icon"))
    }

    #[tokio::test]
    async fn test_no_icon_means_no_traffic() {
        let h = harness();
        start_files(&h, json!({"filenames": []})).await;

        run(None, h.files.clone(), h.dispatcher.clone()).await;
        assert!(h.peer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_icon_uploads_then_applies() {
        let h = harness();
        start_files(&h, json!({"filenames": []})).await;
        h.peer.respond_to(FunctionId::PutFile, ResultCode::Success);

        run(Some(icon()), h.files.clone(), h.dispatcher.clone()).await;

        assert_eq!(
            h.peer.sent_functions(),
            vec![FunctionId::PutFile, FunctionId::SetAppIcon]
        );
        let apply = h.peer.sent_requests(FunctionId::SetAppIcon).remove(0);
        assert_eq!(apply.payload["fileName"], "app_icon.png");
    }

    #[tokio::test]
    async fn test_known_icon_skips_upload() {
        let h = harness();
        start_files(&h, json!({"filenames": ["app_icon.png"]})).await;

        run(Some(icon()), h.files.clone(), h.dispatcher.clone()).await;
        assert_eq!(h.peer.sent_functions(), vec![FunctionId::SetAppIcon]);
    }

    #[tokio::test]
    async fn test_failed_upload_suppresses_apply() {
        let h = harness();
        start_files(&h, json!({"filenames": []})).await;
        h.peer.respond_to(FunctionId::PutFile, ResultCode::Rejected);

        run(Some(icon()), h.files.clone(), h.dispatcher.clone()).await;
        assert_eq!(h.peer.sent_functions(), vec![FunctionId::PutFile]);
    }

    #[tokio::test]
    async fn test_unusable_files_component_applies_directly() {
        let h = harness();
        // files never started: not operational, upload would be refused
        run(Some(icon()), h.files.clone(), h.dispatcher.clone()).await;
        assert_eq!(h.peer.sent_functions(), vec![FunctionId::SetAppIcon]);
    }
}
