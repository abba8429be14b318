//! Change events fired by the namespace catalogs.
//!
//! Every structural mutation produces a [`CatalogEvent`] carrying the old and
//! the new value of the touched object. Events are delivered synchronously on
//! the mutating thread, after the catalog has released its write lock.

mod bus;
mod listener;

pub use bus::{EventBus, SubscriptionId};
pub use listener::{CatalogListener, MemoryListener, TracingListener};

use std::fmt;

use crate::catalog::{
    Collection, Column, Constraint, ForeignKey, Graph, Index, Key, Namespace, Table,
};
use crate::error::ObjectKind;
use crate::ids::{EntityId, NamespaceId};

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The object was created.
    Created,
    /// The object was renamed.
    Renamed,
    /// A property other than name or type changed.
    Altered,
    /// The declared type of a column changed.
    TypeChanged,
    /// The object was dropped.
    Dropped,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::Renamed => write!(f, "renamed"),
            EventKind::Altered => write!(f, "altered"),
            EventKind::TypeChanged => write!(f, "type_changed"),
            EventKind::Dropped => write!(f, "dropped"),
        }
    }
}

/// A catalog object as carried by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogObject {
    /// A namespace.
    Namespace(Namespace),
    /// A table, view or materialized view.
    Table(Table),
    /// A column.
    Column(Column),
    /// A key.
    Key(Key),
    /// A foreign key.
    ForeignKey(ForeignKey),
    /// A constraint.
    Constraint(Constraint),
    /// An index.
    Index(Index),
    /// A collection.
    Collection(Collection),
    /// A graph.
    Graph(Graph),
    /// An alias of a graph.
    GraphAlias {
        /// The aliased graph.
        graph_id: EntityId,
        /// The alias.
        alias: String,
    },
}

impl CatalogObject {
    /// Kind of the object.
    pub fn kind(&self) -> ObjectKind {
        match self {
            CatalogObject::Namespace(_) => ObjectKind::Namespace,
            CatalogObject::Table(_) => ObjectKind::Table,
            CatalogObject::Column(_) => ObjectKind::Column,
            CatalogObject::Key(_) => ObjectKind::Key,
            CatalogObject::ForeignKey(_) => ObjectKind::ForeignKey,
            CatalogObject::Constraint(_) => ObjectKind::Constraint,
            CatalogObject::Index(_) => ObjectKind::Index,
            CatalogObject::Collection(_) => ObjectKind::Collection,
            CatalogObject::Graph(_) => ObjectKind::Graph,
            CatalogObject::GraphAlias { .. } => ObjectKind::GraphAlias,
        }
    }

    /// Id of the object. Aliases report the aliased graph.
    pub fn id(&self) -> u64 {
        match self {
            CatalogObject::Namespace(n) => n.id,
            CatalogObject::Table(t) => t.id,
            CatalogObject::Column(c) => c.id,
            CatalogObject::Key(k) => k.id,
            CatalogObject::ForeignKey(f) => f.id,
            CatalogObject::Constraint(c) => c.id,
            CatalogObject::Index(i) => i.id,
            CatalogObject::Collection(c) => c.id,
            CatalogObject::Graph(g) => g.id,
            CatalogObject::GraphAlias { graph_id, .. } => *graph_id,
        }
    }
}

/// A structural change of one namespace catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEvent {
    /// Namespace whose catalog changed.
    pub namespace_id: NamespaceId,
    /// What happened.
    pub kind: EventKind,
    /// Value before the change; `None` on creation.
    pub old: Option<CatalogObject>,
    /// Value after the change; `None` on drop.
    pub new: Option<CatalogObject>,
}

impl CatalogEvent {
    /// An object was created.
    pub fn created(namespace_id: NamespaceId, object: CatalogObject) -> Self {
        Self {
            namespace_id,
            kind: EventKind::Created,
            old: None,
            new: Some(object),
        }
    }

    /// An object was dropped.
    pub fn dropped(namespace_id: NamespaceId, object: CatalogObject) -> Self {
        Self {
            namespace_id,
            kind: EventKind::Dropped,
            old: Some(object),
            new: None,
        }
    }

    /// An object was replaced by a modified copy.
    pub fn changed(
        namespace_id: NamespaceId,
        kind: EventKind,
        old: CatalogObject,
        new: CatalogObject,
    ) -> Self {
        Self {
            namespace_id,
            kind,
            old: Some(old),
            new: Some(new),
        }
    }

    /// Kind of the object the event is about.
    pub fn object_kind(&self) -> Option<ObjectKind> {
        self.new.as_ref().or(self.old.as_ref()).map(|o| o.kind())
    }

    /// Id of the object the event is about.
    pub fn object_id(&self) -> Option<u64> {
        self.new.as_ref().or(self.old.as_ref()).map(|o| o.id())
    }
}

/// Events collected while a catalog holds its write lock.
///
/// They are published once the lock is released and only if the operation
/// succeeded.
#[derive(Debug)]
pub(crate) struct ChangeSet {
    namespace_id: NamespaceId,
    events: Vec<CatalogEvent>,
}

impl ChangeSet {
    pub(crate) fn new(namespace_id: NamespaceId) -> Self {
        Self {
            namespace_id,
            events: Vec::new(),
        }
    }

    pub(crate) fn created(&mut self, object: CatalogObject) {
        self.events
            .push(CatalogEvent::created(self.namespace_id, object));
    }

    pub(crate) fn dropped(&mut self, object: CatalogObject) {
        self.events
            .push(CatalogEvent::dropped(self.namespace_id, object));
    }

    pub(crate) fn changed(&mut self, kind: EventKind, old: CatalogObject, new: CatalogObject) {
        self.events
            .push(CatalogEvent::changed(self.namespace_id, kind, old, new));
    }

    pub(crate) fn into_events(self) -> Vec<CatalogEvent> {
        self.events
    }
}

impl fmt::Display for CatalogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.object_kind(), self.object_id()) {
            (Some(kind), Some(id)) => write!(
                f,
                "namespace={} {} {} {}",
                self.namespace_id, kind, id, self.kind
            ),
            _ => write!(f, "namespace={} {}", self.namespace_id, self.kind),
        }
    }
}
