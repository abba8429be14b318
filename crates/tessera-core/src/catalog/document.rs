//! Document namespace catalog.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Collection, EntityKind, Namespace};
use crate::error::{Error, ObjectKind, Result, Violation};
use crate::event::{
    CatalogListener, CatalogObject, ChangeSet, EventBus, EventKind, SubscriptionId,
};
use crate::ids::{EntityId, IdBuilder, NamespaceId};

/// Stored state of a document namespace.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct DocumentState {
    pub(crate) namespace: Namespace,
    pub(crate) collections: HashMap<EntityId, Collection>,
}

impl DocumentState {
    /// Empty state for a namespace.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            collections: HashMap::new(),
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

    /// Get a collection.
    pub fn collection(&self, id: EntityId) -> Result<&Collection> {
        self.collections
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Collection, id))
    }

    /// Get a collection by name.
    pub fn collection_by_name(&self, name: &str) -> Result<&Collection> {
        self.collections
            .values()
            .find(|c| self.namespace.matches(&c.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Collection, name))
    }

    /// All collections ordered by id.
    pub fn collections(&self) -> Vec<&Collection> {
        let mut collections: Vec<_> = self.collections.values().collect();
        collections.sort_by_key(|c| c.id);
        collections
    }

    fn check_name(&self, name: &str, except: Option<EntityId>) -> Result<()> {
        if self
            .collections
            .values()
            .any(|c| Some(c.id) != except && self.namespace.matches(&c.name, name))
        {
            return Err(Violation::DuplicateName {
                kind: ObjectKind::Collection,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Catalog of one document namespace.
#[derive(Debug)]
pub struct DocumentCatalog {
    namespace_id: NamespaceId,
    state: RwLock<DocumentState>,
    /// Held from the start of a mutation until its events are delivered.
    publish_order: ReentrantMutex<()>,
    ids: Arc<IdBuilder>,
    bus: EventBus,
}

impl DocumentCatalog {
    /// Create an empty catalog for `namespace`.
    pub fn new(namespace: Namespace, ids: Arc<IdBuilder>) -> Self {
        Self::from_state(DocumentState::new(namespace), ids)
    }

    /// Create a catalog over previously exported state.
    pub fn from_state(state: DocumentState, ids: Arc<IdBuilder>) -> Self {
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
    pub fn export(&self) -> DocumentState {
        self.state.read().clone()
    }

    /// Independent copy through a serialization roundtrip.
    pub fn copy(&self) -> Result<Self> {
        let bytes = self.state.read().to_bytes()?;
        Ok(Self::from_state(
            DocumentState::from_bytes(&bytes)?,
            self.ids.clone(),
        ))
    }

    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut DocumentState, &mut ChangeSet) -> Result<T>,
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

    pub(crate) fn rename_namespace(&self, name: &str) -> Result<Namespace> {
        self.mutate("rename_namespace", |state, changes| {
            let old = state.namespace.clone();
            state.namespace.name = name.to_string();
            changes.changed(
                EventKind::Renamed,
                CatalogObject::Namespace(old),
                CatalogObject::Namespace(state.namespace.clone()),
            );
            Ok(state.namespace.clone())
        })
    }

    /// Create a collection.
    pub fn add_collection(
        &self,
        name: &str,
        kind: EntityKind,
        modifiable: bool,
    ) -> Result<Collection> {
        self.mutate("add_collection", |state, changes| {
            state.check_name(name, None)?;
            let collection = Collection {
                id: self.ids.next_entity_id(),
                name: name.to_string(),
                namespace_id: self.namespace_id,
                kind,
                modifiable,
            };
            debug!(
                namespace_id = self.namespace_id,
                collection_id = collection.id,
                name,
                "collection created"
            );
            changes.created(CatalogObject::Collection(collection.clone()));
            state.collections.insert(collection.id, collection.clone());
            Ok(collection)
        })
    }

    /// Rename a collection.
    pub fn rename_collection(&self, collection: EntityId, name: &str) -> Result<Collection> {
        self.mutate("rename_collection", |state, changes| {
            let old = state.collection(collection)?.clone();
            state.check_name(name, Some(collection))?;
            let new = Collection {
                name: name.to_string(),
                ..old.clone()
            };
            state.collections.insert(collection, new.clone());
            changes.changed(
                EventKind::Renamed,
                CatalogObject::Collection(old),
                CatalogObject::Collection(new.clone()),
            );
            Ok(new)
        })
    }

    /// Drop a collection.
    pub fn delete_collection(&self, collection: EntityId) -> Result<()> {
        self.mutate("delete_collection", |state, changes| {
            let removed = state
                .collections
                .remove(&collection)
                .ok_or_else(|| Error::not_found(ObjectKind::Collection, collection))?;
            debug!(
                namespace_id = self.namespace_id,
                collection_id = collection,
                "collection dropped"
            );
            changes.dropped(CatalogObject::Collection(removed));
            Ok(())
        })
    }

    /// The namespace record.
    pub fn namespace(&self) -> Namespace {
        self.state.read().namespace.clone()
    }

    /// Get a collection.
    pub fn collection(&self, id: EntityId) -> Result<Collection> {
        self.state.read().collection(id).cloned()
    }

    /// Get a collection by name.
    pub fn collection_by_name(&self, name: &str) -> Result<Collection> {
        self.state.read().collection_by_name(name).cloned()
    }

    /// All collections ordered by id.
    pub fn collections(&self) -> Vec<Collection> {
        self.state
            .read()
            .collections()
            .into_iter()
            .cloned()
            .collect()
    }
}
