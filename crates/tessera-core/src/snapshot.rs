//! Immutable point-in-time view of the whole catalog.
//!
//! A snapshot holds the exported state of every namespace plus lookups
//! derived from it. It never changes after construction; the catalog service
//! hands out a fresh one once the live catalogs have moved on.

use std::collections::{BTreeMap, HashMap};

use crate::catalog::{
    Collection, Column, Constraint, DocumentState, ForeignKey, Graph, GraphState, Index, Key,
    Namespace, NamespaceKind, NamespaceState, RelationalState, Table,
};
use crate::error::{Error, ObjectKind, Result};
use crate::ids::{EntityId, NamespaceId, TableId};

/// Read-only catalog view used by query planning.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    namespaces: BTreeMap<NamespaceId, NamespaceState>,
    /// Lowercased namespace name to id.
    names: HashMap<String, NamespaceId>,
    /// Entity id to the namespace holding it.
    entities: HashMap<EntityId, NamespaceId>,
}

impl Snapshot {
    /// Build a snapshot from exported namespace states.
    pub fn new(version: u64, states: impl IntoIterator<Item = NamespaceState>) -> Self {
        let mut namespaces = BTreeMap::new();
        let mut names = HashMap::new();
        let mut entities = HashMap::new();

        for state in states {
            let namespace = state.namespace();
            let id = namespace.id;
            names.insert(namespace.name.to_lowercase(), id);
            match &state {
                NamespaceState::Relational(s) => {
                    entities.extend(s.tables.keys().map(|t| (*t, id)));
                }
                NamespaceState::Document(s) => {
                    entities.extend(s.collections.keys().map(|c| (*c, id)));
                }
                NamespaceState::Graph(s) => {
                    entities.extend(s.graphs.keys().map(|g| (*g, id)));
                }
            }
            namespaces.insert(id, state);
        }

        Self {
            version,
            namespaces,
            names,
            entities,
        }
    }

    /// Number of changes the catalog had seen when this snapshot was taken.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All namespaces ordered by id.
    pub fn namespaces(&self) -> Vec<&Namespace> {
        self.namespaces.values().map(|s| s.namespace()).collect()
    }

    /// Get a namespace.
    pub fn namespace(&self, id: NamespaceId) -> Result<&Namespace> {
        self.state(id).map(|s| s.namespace())
    }

    /// Get a namespace by name. Namespace names are case insensitive.
    pub fn namespace_by_name(&self, name: &str) -> Result<&Namespace> {
        self.names
            .get(&name.to_lowercase())
            .and_then(|id| self.namespaces.get(id))
            .map(|s| s.namespace())
            .ok_or_else(|| Error::name_not_found(ObjectKind::Namespace, name))
    }

    /// Exported state of a namespace.
    pub fn state(&self, id: NamespaceId) -> Result<&NamespaceState> {
        self.namespaces
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Namespace, id))
    }

    /// State of a relational namespace.
    pub fn relational(&self, id: NamespaceId) -> Result<&RelationalState> {
        match self.state(id)? {
            NamespaceState::Relational(s) => Ok(s),
            other => Err(wrong_kind(other, NamespaceKind::Relational)),
        }
    }

    /// State of a document namespace.
    pub fn document(&self, id: NamespaceId) -> Result<&DocumentState> {
        match self.state(id)? {
            NamespaceState::Document(s) => Ok(s),
            other => Err(wrong_kind(other, NamespaceKind::Document)),
        }
    }

    /// State of a graph namespace.
    pub fn graph_namespace(&self, id: NamespaceId) -> Result<&GraphState> {
        match self.state(id)? {
            NamespaceState::Graph(s) => Ok(s),
            other => Err(wrong_kind(other, NamespaceKind::Graph)),
        }
    }

    fn owning_namespace(&self, entity: EntityId, kind: ObjectKind) -> Result<NamespaceId> {
        self.entities
            .get(&entity)
            .copied()
            .ok_or_else(|| Error::not_found(kind, entity))
    }

    fn relational_of(&self, table: TableId) -> Result<&RelationalState> {
        let namespace = self.owning_namespace(table, ObjectKind::Table)?;
        self.relational(namespace)
            .map_err(|_| Error::not_found(ObjectKind::Table, table))
    }

    /// Get a table of any namespace.
    pub fn table(&self, id: TableId) -> Result<&Table> {
        self.relational_of(id)?.table(id)
    }

    /// Get a table of a namespace by name.
    pub fn table_by_name(&self, namespace: NamespaceId, name: &str) -> Result<&Table> {
        self.relational(namespace)?.table_by_name(name)
    }

    /// Columns of a table ordered by position.
    pub fn columns(&self, table: TableId) -> Result<Vec<&Column>> {
        Ok(self.relational_of(table)?.columns(table))
    }

    /// Keys of a table.
    pub fn keys(&self, table: TableId) -> Result<Vec<&Key>> {
        Ok(self.relational_of(table)?.table_keys(table))
    }

    /// The primary key of a table.
    pub fn primary_key(&self, table: TableId) -> Result<Option<&Key>> {
        Ok(self.relational_of(table)?.primary_key(table))
    }

    /// Foreign keys declared on a table.
    pub fn foreign_keys(&self, table: TableId) -> Result<Vec<&ForeignKey>> {
        Ok(self.relational_of(table)?.foreign_keys(table))
    }

    /// Foreign keys referencing a table.
    pub fn exported_keys(&self, table: TableId) -> Result<Vec<&ForeignKey>> {
        Ok(self.relational_of(table)?.exported_keys(table))
    }

    /// Constraints of a table.
    pub fn constraints(&self, table: TableId) -> Result<Vec<&Constraint>> {
        Ok(self.relational_of(table)?.constraints(table))
    }

    /// Indexes of a table.
    pub fn indexes(&self, table: TableId, only_unique: bool) -> Result<Vec<&Index>> {
        Ok(self.relational_of(table)?.indexes(table, only_unique))
    }

    /// Get a collection of any namespace.
    pub fn collection(&self, id: EntityId) -> Result<&Collection> {
        let namespace = self.owning_namespace(id, ObjectKind::Collection)?;
        self.document(namespace)
            .map_err(|_| Error::not_found(ObjectKind::Collection, id))?
            .collection(id)
    }

    /// Get a graph of any namespace.
    pub fn graph(&self, id: EntityId) -> Result<&Graph> {
        let namespace = self.owning_namespace(id, ObjectKind::Graph)?;
        self.graph_namespace(namespace)
            .map_err(|_| Error::not_found(ObjectKind::Graph, id))?
            .graph(id)
    }

    /// Resolve a graph alias within a namespace.
    pub fn graph_by_alias(&self, namespace: NamespaceId, alias: &str) -> Result<&Graph> {
        self.graph_namespace(namespace)?.graph_by_alias(alias)
    }
}

fn wrong_kind(state: &NamespaceState, expected: NamespaceKind) -> Error {
    let namespace = state.namespace();
    Error::UnsupportedState(format!(
        "namespace '{}' is {}, not {}",
        namespace.name, namespace.kind, expected
    ))
}
