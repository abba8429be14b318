//! Namespace catalogs of every data model behind one handle.

use std::sync::Arc;

use rkyv::{Archive, Deserialize, Serialize};

use super::{
    DocumentCatalog, DocumentState, GraphCatalog, GraphState, Namespace, NamespaceKind,
    RelationalCatalog, RelationalState,
};
use crate::config::CatalogConfig;
use crate::error::Result;
use crate::event::{CatalogListener, EventBus, SubscriptionId};
use crate::ids::{IdBuilder, NamespaceId};

/// Exported state of one namespace catalog.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum NamespaceState {
    /// A relational namespace.
    Relational(RelationalState),
    /// A document namespace.
    Document(DocumentState),
    /// A graph namespace.
    Graph(GraphState),
}

impl NamespaceState {
    /// The namespace record.
    pub fn namespace(&self) -> &Namespace {
        match self {
            NamespaceState::Relational(s) => s.namespace(),
            NamespaceState::Document(s) => s.namespace(),
            NamespaceState::Graph(s) => s.namespace(),
        }
    }

    /// Data model of the namespace.
    pub fn kind(&self) -> NamespaceKind {
        self.namespace().kind
    }
}

/// Shared handle to the catalog of one namespace.
#[derive(Debug, Clone)]
pub enum NamespaceCatalog {
    /// A relational namespace.
    Relational(Arc<RelationalCatalog>),
    /// A document namespace.
    Document(Arc<DocumentCatalog>),
    /// A graph namespace.
    Graph(Arc<GraphCatalog>),
}

impl NamespaceCatalog {
    /// Create an empty catalog matching the kind of `namespace`.
    pub fn create(namespace: Namespace, ids: Arc<IdBuilder>, config: &CatalogConfig) -> Self {
        match namespace.kind {
            NamespaceKind::Relational => NamespaceCatalog::Relational(Arc::new(
                RelationalCatalog::new(namespace, ids, config),
            )),
            NamespaceKind::Document => {
                NamespaceCatalog::Document(Arc::new(DocumentCatalog::new(namespace, ids)))
            }
            NamespaceKind::Graph => {
                NamespaceCatalog::Graph(Arc::new(GraphCatalog::new(namespace, ids)))
            }
        }
    }

    /// Rebuild a catalog from exported state.
    pub fn restore(state: NamespaceState, ids: Arc<IdBuilder>, config: &CatalogConfig) -> Self {
        match state {
            NamespaceState::Relational(s) => NamespaceCatalog::Relational(Arc::new(
                RelationalCatalog::from_state(s, ids, config),
            )),
            NamespaceState::Document(s) => {
                NamespaceCatalog::Document(Arc::new(DocumentCatalog::from_state(s, ids)))
            }
            NamespaceState::Graph(s) => {
                NamespaceCatalog::Graph(Arc::new(GraphCatalog::from_state(s, ids)))
            }
        }
    }

    /// Id of the namespace.
    pub fn id(&self) -> NamespaceId {
        match self {
            NamespaceCatalog::Relational(c) => c.id(),
            NamespaceCatalog::Document(c) => c.id(),
            NamespaceCatalog::Graph(c) => c.id(),
        }
    }

    /// The namespace record.
    pub fn namespace(&self) -> Namespace {
        match self {
            NamespaceCatalog::Relational(c) => c.namespace(),
            NamespaceCatalog::Document(c) => c.namespace(),
            NamespaceCatalog::Graph(c) => c.namespace(),
        }
    }

    /// Data model of the namespace.
    pub fn kind(&self) -> NamespaceKind {
        match self {
            NamespaceCatalog::Relational(_) => NamespaceKind::Relational,
            NamespaceCatalog::Document(_) => NamespaceKind::Document,
            NamespaceCatalog::Graph(_) => NamespaceKind::Graph,
        }
    }

    /// The event bus of the catalog.
    pub fn events(&self) -> &EventBus {
        match self {
            NamespaceCatalog::Relational(c) => c.events(),
            NamespaceCatalog::Document(c) => c.events(),
            NamespaceCatalog::Graph(c) => c.events(),
        }
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: Arc<dyn CatalogListener>) -> SubscriptionId {
        self.events().subscribe(listener)
    }

    /// Clone the state under one read lock.
    pub fn export(&self) -> NamespaceState {
        match self {
            NamespaceCatalog::Relational(c) => NamespaceState::Relational(c.export()),
            NamespaceCatalog::Document(c) => NamespaceState::Document(c.export()),
            NamespaceCatalog::Graph(c) => NamespaceState::Graph(c.export()),
        }
    }

    pub(crate) fn rename(&self, name: &str) -> Result<Namespace> {
        match self {
            NamespaceCatalog::Relational(c) => c.rename_namespace(name),
            NamespaceCatalog::Document(c) => c.rename_namespace(name),
            NamespaceCatalog::Graph(c) => c.rename_namespace(name),
        }
    }
}
