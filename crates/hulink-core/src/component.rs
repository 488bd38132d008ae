//! Sub-component contract consumed by the manager coordination layer

use crate::readiness::ReadinessState;

/// One-shot completion signal handed to [`SubComponent::start`].
///
/// Consuming `self` makes at-most-once delivery a type-level guarantee;
/// every component must complete it exactly once when its initialization
/// settles, successfully or not.
pub struct CompletionCallback {
    inner: Box<dyn FnOnce(bool) + Send>,
}

impl CompletionCallback {
    pub fn new(f: impl FnOnce(bool) + Send + 'static) -> Self {
        Self { inner: Box::new(f) }
    }

    /// Report the initialization outcome
    pub fn complete(self, success: bool) {
        (self.inner)(success)
    }
}

impl std::fmt::Debug for CompletionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompletionCallback")
    }
}

/// A managed capability with an observable readiness lifecycle.
///
/// `start` must not block: long-running initialization work runs on tasks
/// the component spawns itself. The coordination layer only ever observes
/// `state()` and the completion callback.
pub trait SubComponent: Send + Sync {
    /// Stable name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Current readiness of this component
    fn state(&self) -> ReadinessState;

    /// Begin initialization; `completion` fires once the component settles
    fn start(&self, completion: CompletionCallback);

    /// Tear down; idempotent, aborts any in-flight initialization
    fn dispose(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_completion_callback_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let cb = CompletionCallback::new(move |success| {
            assert!(success);
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        cb.complete(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
