//! Change listener backends.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{CatalogEvent, EventKind};
use crate::error::ObjectKind;

/// Receives change events of a catalog.
pub trait CatalogListener: Send + Sync {
    /// Handle one event. Called on the mutating thread.
    fn on_change(&self, event: &CatalogEvent);
}

impl<F> CatalogListener for F
where
    F: Fn(&CatalogEvent) + Send + Sync,
{
    fn on_change(&self, event: &CatalogEvent) {
        self(event)
    }
}

/// In-memory listener that records every event.
#[derive(Debug, Default, Clone)]
pub struct MemoryListener {
    events: Arc<Mutex<Vec<CatalogEvent>>>,
}

impl MemoryListener {
    /// Create a new memory listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events.
    pub fn events(&self) -> Vec<CatalogEvent> {
        self.events.lock().clone()
    }

    /// Recorded events about one kind of object.
    pub fn events_for(&self, kind: ObjectKind) -> Vec<CatalogEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.object_kind() == Some(kind))
            .cloned()
            .collect()
    }

    /// Recorded (object kind, event kind) pairs, in delivery order.
    pub fn summary(&self) -> Vec<(ObjectKind, EventKind)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| e.object_kind().map(|k| (k, e.kind)))
            .collect()
    }

    /// Clear all events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl CatalogListener for MemoryListener {
    fn on_change(&self, event: &CatalogEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Listener that logs every event at debug level.
#[derive(Debug, Default)]
pub struct TracingListener;

impl CatalogListener for TracingListener {
    fn on_change(&self, event: &CatalogEvent) {
        tracing::debug!(
            namespace_id = event.namespace_id,
            object = ?event.object_kind(),
            object_id = ?event.object_id(),
            kind = %event.kind,
            "catalog changed"
        );
    }
}
