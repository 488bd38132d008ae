//! Listener registries keyed by function identifier

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hulink_core::FunctionId;
use parking_lot::RwLock;

/// Token identifying one registration.
///
/// Closures carry no object identity in Rust, so removal works through the
/// token handed out at registration time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener registry for one handler shape.
///
/// Listeners for a function are invoked in registration order; removal by
/// token never disturbs the order of the remaining entries.
pub(crate) struct ListenerRegistry<H: ?Sized> {
    entries: RwLock<HashMap<FunctionId, Vec<(ListenerId, Arc<H>)>>>,
    next_id: AtomicU64,
}

impl<H: ?Sized> ListenerRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, function: FunctionId, handler: Arc<H>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .entry(function)
            .or_default()
            .push((id, handler));
        id
    }

    /// Returns true when a registration was actually removed
    pub fn remove(&self, function: FunctionId, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let Some(listeners) = entries.get_mut(&function) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(entry_id, _)| *entry_id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            entries.remove(&function);
        }
        removed
    }

    /// Snapshot the handlers for a function, in registration order.
    ///
    /// Handlers are cloned out so they can be invoked without holding the
    /// registry lock; a listener may therefore add or remove listeners
    /// from inside its own callback.
    pub fn collect(&self, function: FunctionId) -> Vec<Arc<H>> {
        self.entries
            .read()
            .get(&function)
            .map(|listeners| listeners.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn len(&self, function: FunctionId) -> usize {
        self.entries
            .read()
            .get(&function)
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Recorder = dyn Fn(u32) + Send + Sync;

    #[test]
    fn test_listeners_invoked_in_registration_order() {
        let registry: ListenerRegistry<Recorder> = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in [1u32, 2, 3] {
            let order = order.clone();
            registry.add(
                FunctionId::OnHmiStatus,
                Arc::new(move |_| order.lock().push(tag)),
            );
        }

        for handler in registry.collect(FunctionId::OnHmiStatus) {
            handler(0);
        }
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_remove_by_token() {
        let registry: ListenerRegistry<Recorder> = ListenerRegistry::new();
        let first = registry.add(FunctionId::OnCommand, Arc::new(|_| {}));
        let second = registry.add(FunctionId::OnCommand, Arc::new(|_| {}));

        assert!(registry.remove(FunctionId::OnCommand, first));
        assert_eq!(registry.len(FunctionId::OnCommand), 1);
        // token already consumed
        assert!(!registry.remove(FunctionId::OnCommand, first));
        // wrong function, right token
        assert!(!registry.remove(FunctionId::OnHmiStatus, second));
        assert!(registry.remove(FunctionId::OnCommand, second));
        assert_eq!(registry.len(FunctionId::OnCommand), 0);
    }

    #[test]
    fn test_collect_unknown_function_is_empty() {
        let registry: ListenerRegistry<Recorder> = ListenerRegistry::new();
        assert!(registry.collect(FunctionId::OnLanguageChange).is_empty());
    }
}
