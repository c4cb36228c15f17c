//! In-process event bus.
//!
//! Every subscription gets its own unbounded queue, so a slow subscriber
//! never loses events and never blocks the publisher.

use crate::core::sync::lock;
use crate::events::event::PluginEvent;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<u64, mpsc::UnboundedSender<PluginEvent>>,
}

/// Owned event source shared by the registry and its subscribers.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = lock(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, sender);
        tracing::trace!(listener = id, "event listener registered");

        EventSubscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Deliver an event to every listener, in registration order per listener.
    ///
    /// Returns the number of listeners reached.
    pub fn publish(&self, event: PluginEvent) -> usize {
        let mut inner = lock(&self.inner);
        inner
            .listeners
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        tracing::trace!(kind = %event.kind(), listeners = inner.listeners.len(), "event published");
        inner.listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A registered listener.
///
/// Unregisters on `unsubscribe` or drop, whichever happens first; later calls
/// are no-ops.
pub struct EventSubscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<PluginEvent>,
    bus: Weak<Mutex<BusInner>>,
    active: bool,
}

impl EventSubscription {
    /// Next event; `None` once unsubscribed and drained, or when the bus is gone.
    pub async fn recv(&mut self) -> Option<PluginEvent> {
        self.receiver.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<PluginEvent> {
        self.receiver.try_recv().ok()
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Remove the listener from the bus.
    pub fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(bus) = self.bus.upgrade() {
            lock(&bus).listeners.remove(&self.id);
            tracing::trace!(listener = self.id, "event listener released");
        }
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
