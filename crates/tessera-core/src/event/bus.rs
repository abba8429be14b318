//! Synchronous publish/subscribe bus.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{CatalogEvent, CatalogListener};

/// Handle returned by [`EventBus::subscribe`].
pub type SubscriptionId = u64;

/// Listener registry of one catalog.
///
/// `publish` calls every listener on the caller's thread, in subscription
/// order. The registry lock is not held while listeners run, so a listener
/// may subscribe, unsubscribe or read the catalog.
pub struct EventBus {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn CatalogListener>)>>,
    next_subscription_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: Arc<dyn CatalogListener>) -> SubscriptionId {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.write().push((id, listener));
        tracing::trace!(subscription_id = id, "catalog listener subscribed");
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        before != listeners.len()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver one event to every listener.
    pub fn publish(&self, event: &CatalogEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener.on_change(event);
        }
    }

    /// Deliver events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = CatalogEvent>) {
        for event in events {
            self.publish(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
