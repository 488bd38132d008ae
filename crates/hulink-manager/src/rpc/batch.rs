//! Batch job types shared by the sequential and concurrent send paths

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use hulink_core::FunctionId;
use tracing::debug;
use uuid::Uuid;

use super::dispatcher::RequestOutcome;

/// Identifier of one submitted batch, used in logs and updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchId(Uuid);

impl BatchId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-item progress report
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    /// Position of the item in the submitted batch
    pub index: usize,
    pub function: FunctionId,
    /// Sequence number the item was stamped with
    pub correlation: u32,
    pub outcome: RequestOutcome,
}

/// Progress observer for a batch job.
///
/// `on_update` fires once per item as its outcome becomes known (submission
/// order for sequential jobs, arrival order for concurrent ones);
/// `on_finished` fires exactly once after every item has reported.
pub trait BatchListener: Send + Sync {
    fn on_update(&self, update: BatchUpdate);
    fn on_finished(&self, all_succeeded: bool);
}

/// Shared countdown driving `on_finished`.
///
/// Each batch item holds one reference and reports exactly once (the
/// pending table consumes its continuation exactly once), so the counter
/// can never be decremented twice for the same item.
pub(crate) struct BatchProgress {
    id: BatchId,
    remaining: AtomicUsize,
    all_success: AtomicBool,
    listener: Arc<dyn BatchListener>,
}

impl BatchProgress {
    pub fn new(id: BatchId, total: usize, listener: Arc<dyn BatchListener>) -> Arc<Self> {
        Arc::new(Self {
            id,
            remaining: AtomicUsize::new(total),
            all_success: AtomicBool::new(true),
            listener,
        })
    }

    /// Deliver one item outcome; fires `on_finished` when it was the last
    pub fn record(&self, update: BatchUpdate) {
        if !update.outcome.is_success() {
            self.all_success.store(false, Ordering::SeqCst);
        }
        self.listener.on_update(update);
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            let all_succeeded = self.all_success.load(Ordering::SeqCst);
            debug!(batch = %self.id, all_succeeded, "batch finished");
            self.listener.on_finished(all_succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hulink_core::{Response, ResultCode};
    use parking_lot::Mutex;
    use serde_json::Value;

    use crate::rpc::DispatchError;

    #[derive(Default)]
    struct Recording {
        updates: Mutex<Vec<(usize, bool)>>,
        finishes: Mutex<Vec<bool>>,
    }

    impl BatchListener for Recording {
        fn on_update(&self, update: BatchUpdate) {
            self.updates
                .lock()
                .push((update.index, update.outcome.is_success()));
        }
        fn on_finished(&self, all_succeeded: bool) {
            self.finishes.lock().push(all_succeeded);
        }
    }

    fn response_outcome(result: ResultCode) -> RequestOutcome {
        RequestOutcome::Response(Response {
            function: FunctionId::Show,
            correlation: 1,
            result,
            info: None,
            payload: Value::Null,
        })
    }

    fn update(index: usize, outcome: RequestOutcome) -> BatchUpdate {
        BatchUpdate {
            index,
            function: FunctionId::Show,
            correlation: index as u32 + 1,
            outcome,
        }
    }

    #[test]
    fn test_finishes_once_after_all_items() {
        let listener = Arc::new(Recording::default());
        let progress = BatchProgress::new(BatchId::new(), 3, listener.clone());

        progress.record(update(0, response_outcome(ResultCode::Success)));
        progress.record(update(2, response_outcome(ResultCode::Success)));
        assert!(listener.finishes.lock().is_empty());

        progress.record(update(1, response_outcome(ResultCode::Warnings)));
        assert_eq!(*listener.finishes.lock(), vec![true]);
        assert_eq!(listener.updates.lock().len(), 3);
    }

    #[test]
    fn test_any_failure_clears_aggregate_success() {
        let listener = Arc::new(Recording::default());
        let progress = BatchProgress::new(BatchId::new(), 2, listener.clone());

        progress.record(update(0, response_outcome(ResultCode::Rejected)));
        progress.record(update(1, response_outcome(ResultCode::Success)));
        assert_eq!(*listener.finishes.lock(), vec![false]);
    }

    #[test]
    fn test_failed_outcome_counts_like_a_response() {
        let listener = Arc::new(Recording::default());
        let progress = BatchProgress::new(BatchId::new(), 2, listener.clone());

        progress.record(update(0, RequestOutcome::Failed(DispatchError::NotConnected)));
        progress.record(update(1, response_outcome(ResultCode::Success)));
        assert_eq!(*listener.finishes.lock(), vec![false]);
        assert_eq!(*listener.updates.lock(), vec![(0, false), (1, true)]);
    }
}
