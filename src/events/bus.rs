//! Event Bus
//!
//! In-process publish/subscribe mediator. Handlers run synchronously in
//! registration order; a handler that fails or panics is logged and skipped,
//! the remaining handlers still run.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::messages::{AppEvent, EventKind};

/// Error a handler may return; it is logged and never reaches the emitter
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by event handlers
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&AppEvent) -> HandlerResult + Send + Sync>;

/// Identifies one registration for [`EventBus::off`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct BusInner {
    handlers: HashMap<EventKind, Vec<Registration>>,
    next_id: u64,
}

/// Cloneable handle to a shared event bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.total_handlers())
            .finish()
    }
}

/// Handle returned by [`EventBus::on`]; call [`Subscription::unsubscribe`] to detach
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<Mutex<BusInner>>,
    kind: EventKind,
    id: HandlerId,
}

impl Subscription {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Detach the handler. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => remove(&inner, self.kind, self.id),
            None => false,
        }
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    // a panicking handler never runs under the lock, but stay usable regardless
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove(inner: &Mutex<BusInner>, kind: EventKind, id: HandlerId) -> bool {
    let mut guard = lock(inner);
    let Some(list) = guard.handlers.get_mut(&kind) else {
        return false;
    };
    let before = list.len();
    list.retain(|r| r.id != id);
    let removed = list.len() != before;
    if list.is_empty() {
        guard.handlers.remove(&kind);
    }
    removed
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of `kind`
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&AppEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Subscribe to the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&AppEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    fn register(&self, kind: EventKind, handler: Handler, once: bool) -> Subscription {
        let mut guard = lock(&self.inner);
        guard.next_id += 1;
        let id = HandlerId(guard.next_id);
        guard
            .handlers
            .entry(kind)
            .or_default()
            .push(Registration { id, handler, once });

        tracing::trace!(event = %kind, handler = id.0, "Handler registered");
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Remove a handler by id
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        remove(&self.inner, kind, id)
    }

    /// Publish an event to its subscribers
    pub fn emit(&self, event: AppEvent) {
        let kind = event.kind();

        // Snapshot so handlers may subscribe, unsubscribe or emit re-entrantly
        let snapshot: Vec<(HandlerId, Handler)> = {
            let mut guard = lock(&self.inner);
            let Some(list) = guard.handlers.get_mut(&kind) else {
                tracing::trace!(event = %kind, "No handlers");
                return;
            };
            let snapshot = list
                .iter()
                .map(|r| (r.id, Arc::clone(&r.handler)))
                .collect();
            list.retain(|r| !r.once);
            if list.is_empty() {
                guard.handlers.remove(&kind);
            }
            snapshot
        };

        tracing::debug!(event = %kind, handlers = snapshot.len(), "Emitting event");

        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(event = %kind, handler = id.0, error = %e, "Event handler failed");
                }
                Err(_) => {
                    tracing::error!(event = %kind, handler = id.0, "Event handler panicked");
                }
            }
        }
    }

    /// Remove the handlers of one kind, or of every kind
    pub fn clear(&self, kind: Option<EventKind>) {
        let mut guard = lock(&self.inner);
        match kind {
            Some(kind) => {
                guard.handlers.remove(&kind);
            }
            None => guard.handlers.clear(),
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.inner)
            .handlers
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn total_handlers(&self) -> usize {
        lock(&self.inner).handlers.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Resource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |tag: &str| -> Handler {
            let log = Arc::clone(&log_clone);
            let tag = tag.to_string();
            Arc::new(move |_e: &AppEvent| {
                log.lock().unwrap().push(tag.clone());
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let a = make("a");
        let b = make("b");
        bus.on(EventKind::AuthLogout, move |e| a(e));
        bus.on(EventKind::AuthLogout, move |e| b(e));

        bus.emit(AppEvent::AuthLogout);

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_failing_and_panicking_handlers_are_isolated() {
        let bus = EventBus::new();
        let reached = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::SettingsReset, |_| Err("boom".into()));
        bus.on(EventKind::SettingsReset, |_| panic!("handler panic"));
        let r = Arc::clone(&reached);
        bus.on(EventKind::SettingsReset, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(AppEvent::SettingsReset);
        bus.emit(AppEvent::SettingsReset);

        assert_eq!(reached.load(Ordering::SeqCst), 2);
        assert_eq!(bus.handler_count(EventKind::SettingsReset), 3);
    }

    #[test]
    fn test_once_runs_a_single_time() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.once(EventKind::AuthLogin, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let user = crate::api::dto::User {
            id: 1,
            username: None,
            email: None,
            name: None,
            role: None,
        };
        bus.emit(AppEvent::AuthLogin { user: user.clone() });
        bus.emit(AppEvent::AuthLogin { user });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.handler_count(EventKind::AuthLogin), 0);
    }

    #[test]
    fn test_unsubscribe_and_off() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = Arc::clone(&count);
        let c2 = Arc::clone(&count);
        let first = bus.on(EventKind::AuthLogout, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let second = bus.on(EventKind::AuthLogout, move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        assert!(first.unsubscribe());
        assert!(bus.off(EventKind::AuthLogout, second.id()));
        assert!(!bus.off(EventKind::AuthLogout, second.id()));

        bus.emit(AppEvent::AuthLogout);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_kinds_are_per_resource() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        bus.on(EventKind::Error(Resource::Personnel), move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.emit(AppEvent::error(Resource::Attendance, "nope"));
        bus.emit(AppEvent::error(Resource::Personnel, "nope"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::new();
        bus.on(EventKind::AuthLogout, |_| Ok(()));
        bus.on(EventKind::SettingsReset, |_| Ok(()));

        bus.clear(Some(EventKind::AuthLogout));
        assert_eq!(bus.total_handlers(), 1);

        bus.clear(None);
        assert_eq!(bus.total_handlers(), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_emit() {
        let bus = EventBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let sub = bus.on(EventKind::AuthLogout, move |_| {
            if let Some(sub) = slot_clone.lock().unwrap().take() {
                sub.unsubscribe();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(sub);

        bus.emit(AppEvent::AuthLogout);
        assert_eq!(bus.handler_count(EventKind::AuthLogout), 0);
    }
}
