//! Graph namespace catalog.
//!
//! A graph namespace always contains its default graph, whose id equals the
//! namespace id. Further graphs may be added and dropped, and any graph can
//! be reached through aliases.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Graph, Namespace};
use crate::error::{Error, ObjectKind, Result, Violation};
use crate::event::{
    CatalogListener, CatalogObject, ChangeSet, EventBus, EventKind, SubscriptionId,
};
use crate::ids::{EntityId, IdBuilder, NamespaceId};

/// Stored state of a graph namespace.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct GraphState {
    pub(crate) namespace: Namespace,
    pub(crate) graphs: HashMap<EntityId, Graph>,
    /// Alias to graph id.
    pub(crate) aliases: HashMap<String, EntityId>,
}

impl GraphState {
    /// State holding only the default graph of `namespace`.
    pub fn new(namespace: Namespace) -> Self {
        let default_graph = Graph {
            id: namespace.id,
            name: namespace.name.clone(),
            namespace_id: namespace.id,
            modifiable: true,
        };
        Self {
            graphs: HashMap::from([(default_graph.id, default_graph)]),
            aliases: HashMap::new(),
            namespace,
        }
    }

    /// Serialize the state to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize state from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// The namespace record.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Get a graph.
    pub fn graph(&self, id: EntityId) -> Result<&Graph> {
        self.graphs
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Graph, id))
    }

    /// Get a graph by name.
    pub fn graph_by_name(&self, name: &str) -> Result<&Graph> {
        self.graphs
            .values()
            .find(|g| self.namespace.matches(&g.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Graph, name))
    }

    /// Resolve an alias to its graph.
    pub fn graph_by_alias(&self, alias: &str) -> Result<&Graph> {
        let id = self
            .alias_entry(alias)
            .map(|(_, id)| id)
            .ok_or_else(|| Error::name_not_found(ObjectKind::GraphAlias, alias))?;
        self.graph(id)
    }

    /// Aliases of a graph, sorted.
    pub fn aliases_of(&self, graph: EntityId) -> Vec<&str> {
        let mut aliases: Vec<_> = self
            .aliases
            .iter()
            .filter(|(_, id)| **id == graph)
            .map(|(alias, _)| alias.as_str())
            .collect();
        aliases.sort_unstable();
        aliases
    }

    /// All graphs ordered by id.
    pub fn graphs(&self) -> Vec<&Graph> {
        let mut graphs: Vec<_> = self.graphs.values().collect();
        graphs.sort_by_key(|g| g.id);
        graphs
    }

    /// The default graph.
    pub fn default_graph(&self) -> Result<&Graph> {
        self.graph(self.namespace.id)
    }

    fn alias_entry(&self, alias: &str) -> Option<(&str, EntityId)> {
        self.aliases
            .iter()
            .find(|(existing, _)| self.namespace.matches(existing, alias))
            .map(|(existing, id)| (existing.as_str(), *id))
    }
}

/// Catalog of one graph namespace.
#[derive(Debug)]
pub struct GraphCatalog {
    namespace_id: NamespaceId,
    state: RwLock<GraphState>,
    /// Held from the start of a mutation until its events are delivered.
    publish_order: ReentrantMutex<()>,
    ids: Arc<IdBuilder>,
    bus: EventBus,
}

impl GraphCatalog {
    /// Create a catalog for `namespace` holding its default graph.
    pub fn new(namespace: Namespace, ids: Arc<IdBuilder>) -> Self {
        Self::from_state(GraphState::new(namespace), ids)
    }

    /// Create a catalog over previously exported state.
    pub fn from_state(state: GraphState, ids: Arc<IdBuilder>) -> Self {
        Self {
            namespace_id: state.namespace.id,
            state: RwLock::new(state),
            publish_order: ReentrantMutex::new(()),
            ids,
            bus: EventBus::new(),
        }
    }

    /// Id of the namespace.
    pub fn id(&self) -> NamespaceId {
        self.namespace_id
    }

    /// The event bus of this catalog.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: Arc<dyn CatalogListener>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    /// Clone the whole state under one read lock.
    pub fn export(&self) -> GraphState {
        self.state.read().clone()
    }

    /// Independent copy through a serialization roundtrip.
    pub fn copy(&self) -> Result<Self> {
        let bytes = self.state.read().to_bytes()?;
        Ok(Self::from_state(
            GraphState::from_bytes(&bytes)?,
            self.ids.clone(),
        ))
    }

    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut GraphState, &mut ChangeSet) -> Result<T>,
    ) -> Result<T> {
        let _order = self.publish_order.lock();
        let mut changes = ChangeSet::new(self.namespace_id);
        let result = {
            let mut state = self.state.write();
            f(&mut *state, &mut changes)
        };
        match &result {
            Ok(_) => self.bus.publish_all(changes.into_events()),
            Err(e) if e.violation().is_some() => warn!(
                namespace_id = self.namespace_id,
                operation,
                error = %e,
                "catalog mutation rejected"
            ),
            Err(_) => {}
        }
        result
    }

    /// Rename the namespace. The default graph follows.
    pub(crate) fn rename_namespace(&self, name: &str) -> Result<Namespace> {
        self.mutate("rename_namespace", |state, changes| {
            // The default graph takes the namespace name.
            if let Ok(existing) = state.graph_by_name(name) {
                if existing.id != self.namespace_id {
                    return Err(Violation::DuplicateName {
                        kind: ObjectKind::Graph,
                        name: name.to_string(),
                    }
                    .into());
                }
            }
            let old = state.namespace.clone();
            state.namespace.name = name.to_string();
            changes.changed(
                EventKind::Renamed,
                CatalogObject::Namespace(old),
                CatalogObject::Namespace(state.namespace.clone()),
            );
            if let Some(graph) = state.graphs.get_mut(&self.namespace_id) {
                let old = graph.clone();
                graph.name = name.to_string();
                changes.changed(
                    EventKind::Renamed,
                    CatalogObject::Graph(old),
                    CatalogObject::Graph(graph.clone()),
                );
            }
            Ok(state.namespace.clone())
        })
    }

    /// Create a graph.
    pub fn add_graph(&self, name: &str, modifiable: bool) -> Result<Graph> {
        self.mutate("add_graph", |state, changes| {
            if state.graph_by_name(name).is_ok() {
                return Err(Violation::DuplicateName {
                    kind: ObjectKind::Graph,
                    name: name.to_string(),
                }
                .into());
            }
            let graph = Graph {
                id: self.ids.next_entity_id(),
                name: name.to_string(),
                namespace_id: self.namespace_id,
                modifiable,
            };
            debug!(
                namespace_id = self.namespace_id,
                graph_id = graph.id,
                name,
                "graph created"
            );
            changes.created(CatalogObject::Graph(graph.clone()));
            state.graphs.insert(graph.id, graph.clone());
            Ok(graph)
        })
    }

    /// Drop a graph together with its aliases. The default graph stays.
    pub fn delete_graph(&self, graph: EntityId) -> Result<()> {
        self.mutate("delete_graph", |state, changes| {
            let target = state.graph(graph)?;
            if target.is_default() {
                return Err(Error::UnsupportedState(format!(
                    "the default graph '{}' of namespace {} cannot be dropped",
                    target.name, self.namespace_id
                )));
            }

            let aliases: Vec<String> = state
                .aliases_of(graph)
                .into_iter()
                .map(str::to_string)
                .collect();
            for alias in aliases {
                state.aliases.remove(&alias);
                changes.dropped(CatalogObject::GraphAlias {
                    graph_id: graph,
                    alias,
                });
            }
            if let Some(removed) = state.graphs.remove(&graph) {
                debug!(namespace_id = self.namespace_id, graph_id = graph, "graph dropped");
                changes.dropped(CatalogObject::Graph(removed));
            }
            Ok(())
        })
    }

    /// Add an alias for a graph.
    ///
    /// An alias already in use is an error unless `if_not_exists` is set, in
    /// which case the call does nothing.
    pub fn add_graph_alias(
        &self,
        graph: EntityId,
        alias: &str,
        if_not_exists: bool,
    ) -> Result<()> {
        self.mutate("add_graph_alias", |state, changes| {
            state.graph(graph)?;
            if state.alias_entry(alias).is_some() {
                if if_not_exists {
                    return Ok(());
                }
                return Err(Violation::DuplicateName {
                    kind: ObjectKind::GraphAlias,
                    name: alias.to_string(),
                }
                .into());
            }
            state.aliases.insert(alias.to_string(), graph);
            debug!(graph_id = graph, alias, "graph alias added");
            changes.created(CatalogObject::GraphAlias {
                graph_id: graph,
                alias: alias.to_string(),
            });
            Ok(())
        })
    }

    /// Remove an alias of a graph.
    ///
    /// A missing alias, or one that names another graph, is an error unless
    /// `if_exists` is set.
    pub fn remove_graph_alias(
        &self,
        graph: EntityId,
        alias: &str,
        if_exists: bool,
    ) -> Result<()> {
        self.mutate("remove_graph_alias", |state, changes| {
            let stored = match state.alias_entry(alias) {
                Some((stored, id)) if id == graph => stored.to_string(),
                _ if if_exists => return Ok(()),
                _ => return Err(Error::name_not_found(ObjectKind::GraphAlias, alias)),
            };
            state.aliases.remove(&stored);
            debug!(graph_id = graph, alias = %stored, "graph alias removed");
            changes.dropped(CatalogObject::GraphAlias {
                graph_id: graph,
                alias: stored,
            });
            Ok(())
        })
    }

    /// The namespace record.
    pub fn namespace(&self) -> Namespace {
        self.state.read().namespace.clone()
    }

    /// Get a graph.
    pub fn graph(&self, id: EntityId) -> Result<Graph> {
        self.state.read().graph(id).cloned()
    }

    /// Get a graph by name.
    pub fn graph_by_name(&self, name: &str) -> Result<Graph> {
        self.state.read().graph_by_name(name).cloned()
    }

    /// Resolve an alias.
    pub fn graph_by_alias(&self, alias: &str) -> Result<Graph> {
        self.state.read().graph_by_alias(alias).cloned()
    }

    /// Aliases of a graph.
    pub fn aliases_of(&self, graph: EntityId) -> Vec<String> {
        self.state
            .read()
            .aliases_of(graph)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// All graphs ordered by id.
    pub fn graphs(&self) -> Vec<Graph> {
        self.state.read().graphs().into_iter().cloned().collect()
    }

    /// The default graph.
    pub fn default_graph(&self) -> Result<Graph> {
        self.state.read().default_graph().cloned()
    }
}
