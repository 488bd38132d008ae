//! Remote file bookkeeping and asset upload

use std::collections::HashSet;
use std::sync::Arc;

use hulink_core::{
    CompletionCallback, FunctionId, IconAsset, ReadinessState, Request, ResultCode, SubComponent,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::rpc::{DispatchError, RpcDispatcher};

/// Tracks which files the head unit holds and pushes new ones up.
///
/// Initialization asks the head unit for its file listing. A rejected
/// listing leaves the component Limited: uploads still work, only the
/// knowledge of already-present files is lost. A transport-level failure
/// is a real initialization failure.
pub struct FileTransferComponent {
    dispatcher: Arc<RpcDispatcher>,
    state: Arc<RwLock<ReadinessState>>,
    /// Names the head unit is known to hold
    uploaded: Arc<RwLock<HashSet<String>>>,
    init_handle: Mutex<Option<JoinHandle<()>>>,
}

impl FileTransferComponent {
    pub const NAME: &'static str = "file_transfer";

    pub fn new(dispatcher: Arc<RpcDispatcher>) -> Self {
        Self {
            dispatcher,
            state: Arc::new(RwLock::new(ReadinessState::SettingUp)),
            uploaded: Arc::new(RwLock::new(HashSet::new())),
            init_handle: Mutex::new(None),
        }
    }

    /// Whether the head unit already holds a file under this name
    pub fn has_uploaded(&self, name: &str) -> bool {
        self.uploaded.read().contains(name)
    }

    /// Names the head unit currently holds, as far as this side knows
    pub fn remote_files(&self) -> Vec<String> {
        self.uploaded.read().iter().cloned().collect()
    }

    /// Push one asset to the head unit.
    ///
    /// The request carries name, media type, length and a CRC-32 checksum
    /// so the receiving side can verify the transfer. A success records
    /// the name as present.
    pub async fn upload(&self, asset: &IconAsset) -> Result<(), UploadError> {
        if !self.state.read().is_operational() {
            return Err(UploadError::NotReady);
        }
        let request = Request::new(
            FunctionId::PutFile,
            json!({
                "fileName": asset.name,
                "fileType": asset.media_type,
                "persistentFile": true,
                "length": asset.len(),
                "crc": asset.checksum(),
            }),
        );
        let response = self.dispatcher.send_request(request).await?;
        if response.is_success() {
            info!(file = %asset.name, bytes = asset.len(), "asset uploaded");
            self.uploaded.write().insert(asset.name.clone());
            Ok(())
        } else {
            Err(UploadError::Rejected {
                result: response.result,
                info: response.info,
            })
        }
    }
}

fn parse_file_names(payload: &Value) -> HashSet<String> {
    payload
        .get("filenames")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl SubComponent for FileTransferComponent {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn state(&self) -> ReadinessState {
        *self.state.read()
    }

    fn start(&self, completion: CompletionCallback) {
        let dispatcher = self.dispatcher.clone();
        let state = self.state.clone();
        let uploaded = self.uploaded.clone();

        let handle = tokio::spawn(async move {
            let result = dispatcher
                .send_request(Request::new(FunctionId::ListFiles, Value::Null))
                .await;
            match result {
                Ok(response) if response.is_success() => {
                    let names = parse_file_names(&response.payload);
                    debug!(count = names.len(), "remote file list received");
                    *uploaded.write() = names;
                    *state.write() = ReadinessState::Ready;
                    completion.complete(true);
                }
                Ok(response) => {
                    warn!(result = %response.result, "file listing rejected, continuing degraded");
                    *state.write() = ReadinessState::Limited;
                    completion.complete(true);
                }
                Err(e) => {
                    warn!(error = %e, "file component failed to initialize");
                    *state.write() = ReadinessState::Error;
                    completion.complete(false);
                }
            }
        });
        *self.init_handle.lock() = Some(handle);
    }

    fn dispose(&self) {
        if let Some(handle) = self.init_handle.lock().take() {
            handle.abort();
        }
        self.uploaded.write().clear();
        debug!(component = Self::NAME, "disposed");
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error("Upload rejected: {result}")]
    Rejected {
        result: ResultCode,
        info: Option<String>,
    },

    #[error("File component is not ready")]
    NotReady,

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}
