//! Event Bus - Token-based Listener Registry
//!
//! Holds the handlers bound to one feed stream. Emission is
//! synchronous: every handler runs on the publishing thread, in
//! binding order, before `emit` returns.

use std::sync::{PoisonError, RwLock};

use crate::ports::feed_stream::{EventHandler, SubscriptionId};

/// Listener registry keyed by `SubscriptionId`.
pub struct EventBus<E> {
    handlers: RwLock<Vec<(SubscriptionId, EventHandler<E>)>>,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Bind a handler and return its handle.
    pub fn on(&self, handler: EventHandler<E>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    /// Remove the handler bound under `id`.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(bound, _)| *bound != id);
        handlers.len() != before
    }

    /// Call every bound handler with `event`. Returns how many ran.
    ///
    /// Handlers are snapshotted first so a handler may bind or unbind
    /// without deadlocking the bus.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<EventHandler<E>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in &snapshot {
            handler(event);
        }
        snapshot.len()
    }

    /// Drop every handler.
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn counter(hits: &Arc<AtomicUsize>) -> EventHandler<u32> {
        let hits = Arc::clone(hits);
        Arc::new(move |value: &u32| {
            hits.fetch_add(*value as usize, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_every_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.on(counter(&hits));
        bus.on(counter(&hits));

        assert_eq!(bus.emit(&2), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_off_removes_only_that_handler() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = bus.on(counter(&hits));
        bus.on(counter(&hits));

        assert!(bus.off(first));
        assert!(!bus.off(first));
        assert_eq!(bus.len(), 1);

        bus.emit(&1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_silences_bus() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.on(counter(&hits));
        bus.clear();

        assert!(bus.is_empty());
        assert_eq!(bus.emit(&5), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_unbind_itself() {
        let bus = Arc::new(EventBus::<u32>::new());
        let slot = Arc::new(std::sync::Mutex::new(None));

        let bus_ref = Arc::clone(&bus);
        let slot_ref = Arc::clone(&slot);
        let id = bus.on(Arc::new(move |_: &u32| {
            if let Some(id) = slot_ref.lock().unwrap().take() {
                bus_ref.off(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bus.emit(&0), 1);
        assert!(bus.is_empty());
    }
}
