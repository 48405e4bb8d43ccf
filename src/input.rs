//! Host input surface abstraction.
//!
//! The monitor does not assume a real DOM or window object; it registers
//! activity listeners against an [`InputSurface`] capability. Hosts forward
//! their native input events into an [`EventRegistry`] (or provide their own
//! surface implementation), which also makes the monitor testable headless.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::domain::EventKind;

/// Handler invoked when a subscribed input event occurs.
pub type ActivityHandler = Arc<dyn Fn(&EventKind) + Send + Sync>;

/// Identity of one registered listener; removal uses exactly the id that
/// registration returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Trait for host surfaces that can deliver named input events.
pub trait InputSurface: Send + Sync {
    /// Register a handler for one event kind.
    fn add_listener(&self, event: &EventKind, handler: ActivityHandler) -> ListenerId;

    /// Remove a previously registered handler. Removing an id twice is a
    /// no-op.
    fn remove_listener(&self, id: ListenerId);
}

struct Registration {
    event: EventKind,
    handler: ActivityHandler,
}

/// In-process input surface.
///
/// Bindings forward real input events via [`EventRegistry::emit`]; tests
/// drive it directly.
#[derive(Default)]
pub struct EventRegistry {
    listeners: Mutex<HashMap<ListenerId, Registration>>,
    next_id: AtomicU64,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an input event to every listener subscribed to its kind.
    pub fn emit(&self, event: &EventKind) {
        let handlers: Vec<ActivityHandler> = {
            let listeners = self.listeners.lock().expect("listener registry poisoned");
            listeners
                .values()
                .filter(|r| r.event == *event)
                .map(|r| Arc::clone(&r.handler))
                .collect()
        };

        trace!("Emitting '{}' to {} listener(s)", event, handlers.len());
        for handler in handlers {
            handler(event);
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("listener registry poisoned").len()
    }
}

impl InputSurface for EventRegistry {
    fn add_listener(&self, event: &EventKind, handler: ActivityHandler) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Registration {
            event: event.clone(),
            handler,
        };
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .insert(id, registration);
        trace!("Added listener {:?} for '{}'", id, event);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let removed = self
            .listeners
            .lock()
            .expect("listener registry poisoned")
            .remove(&id);
        if removed.is_some() {
            trace!("Removed listener {:?}", id);
        }
    }
}
