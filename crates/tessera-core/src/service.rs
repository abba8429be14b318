//! The catalog service: namespace registry, id allocation and snapshots.
//!
//! A process owns one [`CatalogService`]. It creates and drops namespaces,
//! hands out the catalog of each namespace, and caches a [`Snapshot`] of the
//! whole catalog that is rebuilt lazily after any change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{
    DocumentCatalog, GraphCatalog, Namespace, NamespaceCatalog, NamespaceKind, NamespaceState,
    RelationalCatalog,
};
use crate::config::CatalogConfig;
use crate::error::{Error, ObjectKind, Result, Violation};
use crate::event::{
    CatalogEvent, CatalogListener, CatalogObject, EventBus, SubscriptionId,
};
use crate::ids::{IdAllocation, IdBuilder, IdWatermarks, NamespaceId};
use crate::snapshot::Snapshot;

/// Serialized form of a whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct CatalogImage {
    /// Every namespace, ordered by id.
    pub namespaces: Vec<NamespaceState>,
    /// Id counters at the time the image was taken.
    pub watermarks: IdWatermarks,
    /// Allocation mode the ids were issued under.
    pub allocation: IdAllocation,
}

impl CatalogImage {
    /// Serialize the image to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an image from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Process-wide listener attached to every namespace catalog.
///
/// Counts changes, which makes any cached snapshot with a lower version
/// stale, and forwards each event to the service-level subscribers.
#[derive(Debug)]
struct ChangeTracker {
    version: AtomicU64,
    bus: EventBus,
}

impl ChangeTracker {
    fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            bus: EventBus::new(),
        }
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl CatalogListener for ChangeTracker {
    fn on_change(&self, event: &CatalogEvent) {
        self.version.fetch_add(1, Ordering::SeqCst);
        self.bus.publish(event);
    }
}

/// Owner of every namespace catalog of a process.
#[derive(Debug)]
pub struct CatalogService {
    config: CatalogConfig,
    ids: Arc<IdBuilder>,
    namespaces: DashMap<NamespaceId, NamespaceCatalog>,
    /// Serializes namespace creation, renaming and removal.
    ddl: Mutex<()>,
    tracker: Arc<ChangeTracker>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl CatalogService {
    /// Create an empty catalog.
    pub fn new(config: CatalogConfig) -> Self {
        let ids = Arc::new(IdBuilder::new(config.id_allocation));
        Self::with_ids(config, ids)
    }

    fn with_ids(config: CatalogConfig, ids: Arc<IdBuilder>) -> Self {
        Self {
            config,
            ids,
            namespaces: DashMap::new(),
            ddl: Mutex::new(()),
            tracker: Arc::new(ChangeTracker::new()),
            snapshot: RwLock::new(None),
        }
    }

    /// The configuration the service was created with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The shared id allocator.
    pub fn id_builder(&self) -> &Arc<IdBuilder> {
        &self.ids
    }

    fn check_namespace_name(&self, name: &str, except: Option<NamespaceId>) -> Result<()> {
        let lowered = name.to_lowercase();
        let taken = self.namespaces.iter().any(|entry| {
            Some(*entry.key()) != except && entry.value().namespace().name.to_lowercase() == lowered
        });
        if taken {
            return Err(Violation::DuplicateName {
                kind: ObjectKind::Namespace,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn register(&self, catalog: NamespaceCatalog) {
        catalog.subscribe(self.tracker.clone());
        self.namespaces.insert(catalog.id(), catalog);
    }

    /// Create a namespace using the configured case sensitivity.
    pub fn add_namespace(&self, name: &str, kind: NamespaceKind) -> Result<Namespace> {
        self.add_namespace_case_sensitive(name, kind, self.config.default_case_sensitive)
    }

    /// Create a namespace with an explicit case sensitivity.
    pub fn add_namespace_case_sensitive(
        &self,
        name: &str,
        kind: NamespaceKind,
        case_sensitive: bool,
    ) -> Result<Namespace> {
        let _ddl = self.ddl.lock();
        if let Err(e) = self.check_namespace_name(name, None) {
            warn!(name, error = %e, "namespace creation rejected");
            return Err(e);
        }

        let namespace = Namespace::new(self.ids.next_namespace_id(), name, kind, case_sensitive);
        self.register(NamespaceCatalog::create(
            namespace.clone(),
            self.ids.clone(),
            &self.config,
        ));
        info!(
            namespace_id = namespace.id,
            name,
            kind = %kind,
            case_sensitive,
            "namespace created"
        );
        self.tracker.on_change(&CatalogEvent::created(
            namespace.id,
            CatalogObject::Namespace(namespace.clone()),
        ));
        Ok(namespace)
    }

    /// Rename a namespace. A graph namespace renames its default graph too.
    pub fn rename_namespace(&self, id: NamespaceId, name: &str) -> Result<Namespace> {
        let _ddl = self.ddl.lock();
        let catalog = self.catalog(id)?;
        if let Err(e) = self.check_namespace_name(name, Some(id)) {
            warn!(namespace_id = id, name, error = %e, "namespace rename rejected");
            return Err(e);
        }
        let namespace = catalog.rename(name)?;
        info!(namespace_id = id, name, "namespace renamed");
        Ok(namespace)
    }

    /// Drop a namespace and everything it contains.
    pub fn delete_namespace(&self, id: NamespaceId) -> Result<()> {
        let _ddl = self.ddl.lock();
        let (_, catalog) = self
            .namespaces
            .remove(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Namespace, id))?;
        let namespace = catalog.namespace();
        info!(namespace_id = id, name = %namespace.name, "namespace dropped");
        self.tracker
            .on_change(&CatalogEvent::dropped(id, CatalogObject::Namespace(namespace)));
        Ok(())
    }

    /// Get a namespace.
    pub fn namespace(&self, id: NamespaceId) -> Result<Namespace> {
        self.catalog(id).map(|c| c.namespace())
    }

    /// Get a namespace by name. Namespace names are case insensitive.
    pub fn namespace_by_name(&self, name: &str) -> Result<Namespace> {
        let lowered = name.to_lowercase();
        self.namespaces
            .iter()
            .map(|entry| entry.value().namespace())
            .find(|ns| ns.name.to_lowercase() == lowered)
            .ok_or_else(|| Error::name_not_found(ObjectKind::Namespace, name))
    }

    /// All namespaces ordered by id.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<_> = self
            .namespaces
            .iter()
            .map(|entry| entry.value().namespace())
            .collect();
        namespaces.sort_by_key(|ns| ns.id);
        namespaces
    }

    /// The catalog of a namespace.
    pub fn catalog(&self, id: NamespaceId) -> Result<NamespaceCatalog> {
        self.namespaces
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(ObjectKind::Namespace, id))
    }

    /// The catalog of a relational namespace.
    pub fn relational(&self, id: NamespaceId) -> Result<Arc<RelationalCatalog>> {
        match self.catalog(id)? {
            NamespaceCatalog::Relational(c) => Ok(c),
            other => Err(wrong_kind(&other, NamespaceKind::Relational)),
        }
    }

    /// The catalog of a document namespace.
    pub fn document(&self, id: NamespaceId) -> Result<Arc<DocumentCatalog>> {
        match self.catalog(id)? {
            NamespaceCatalog::Document(c) => Ok(c),
            other => Err(wrong_kind(&other, NamespaceKind::Document)),
        }
    }

    /// The catalog of a graph namespace.
    pub fn graph(&self, id: NamespaceId) -> Result<Arc<GraphCatalog>> {
        match self.catalog(id)? {
            NamespaceCatalog::Graph(c) => Ok(c),
            other => Err(wrong_kind(&other, NamespaceKind::Graph)),
        }
    }

    /// Receive the events of every namespace, including namespace lifecycle.
    pub fn subscribe(&self, listener: Arc<dyn CatalogListener>) -> SubscriptionId {
        self.tracker.bus.subscribe(listener)
    }

    /// Remove a service-level listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.tracker.bus.unsubscribe(id)
    }

    /// Number of changes applied since the service was created.
    pub fn version(&self) -> u64 {
        self.tracker.version()
    }

    /// A consistent read view of the catalog.
    ///
    /// Returns the cached snapshot unless a change happened since it was
    /// built. Each namespace is exported under a single read lock.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        // Read before exporting: the export holds at least this many changes.
        let version = self.tracker.version();
        if let Some(snapshot) = self.snapshot.read().as_ref() {
            if snapshot.version() >= version {
                return snapshot.clone();
            }
        }

        let states: Vec<_> = self
            .namespaces
            .iter()
            .map(|entry| entry.value().export())
            .collect();
        let snapshot = Arc::new(Snapshot::new(version, states));
        info!(
            version,
            namespaces = snapshot.namespaces().len(),
            "catalog snapshot rebuilt"
        );
        self.install(snapshot)
    }

    /// Cache `snapshot` unless a concurrent rebuild already cached a newer
    /// one, and return whichever is cached.
    fn install(&self, snapshot: Arc<Snapshot>) -> Arc<Snapshot> {
        let mut cached = self.snapshot.write();
        match cached.as_ref() {
            Some(current) if current.version() > snapshot.version() => current.clone(),
            _ => {
                *cached = Some(snapshot.clone());
                snapshot
            }
        }
    }

    /// Export every namespace together with the id counters.
    pub fn image(&self) -> CatalogImage {
        let _ddl = self.ddl.lock();
        let mut namespaces: Vec<_> = self
            .namespaces
            .iter()
            .map(|entry| entry.value().export())
            .collect();
        namespaces.sort_by_key(|s| s.namespace().id);
        // Read after exporting so every exported id is below the marks.
        let watermarks = self.ids.watermarks();
        CatalogImage {
            namespaces,
            watermarks,
            allocation: self.ids.allocation(),
        }
    }

    /// Serialize the whole catalog.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.image().to_bytes()
    }

    /// Restore a catalog serialized by [`CatalogService::to_bytes`].
    pub fn from_bytes(bytes: &[u8], config: CatalogConfig) -> Result<Self> {
        Ok(Self::from_image(CatalogImage::from_bytes(bytes)?, config))
    }

    /// Rebuild a catalog from an image. New ids continue after the image's,
    /// also when `config` picks another allocation mode than the image used.
    pub fn from_image(image: CatalogImage, config: CatalogConfig) -> Self {
        if image.allocation != config.id_allocation {
            info!(
                from = ?image.allocation,
                to = ?config.id_allocation,
                "id allocation changed on restore"
            );
        }
        let watermarks = image
            .watermarks
            .reallocate(image.allocation, config.id_allocation);
        let ids = Arc::new(IdBuilder::restore(config.id_allocation, watermarks));
        let service = Self::with_ids(config, ids);
        for state in image.namespaces {
            let catalog = NamespaceCatalog::restore(state, service.ids.clone(), &service.config);
            debug!(namespace_id = catalog.id(), "namespace restored");
            service.register(catalog);
        }
        info!(
            namespaces = service.namespaces.len(),
            "catalog restored"
        );
        service
    }
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new(CatalogConfig::default())
    }
}

fn wrong_kind(catalog: &NamespaceCatalog, expected: NamespaceKind) -> Error {
    let namespace = catalog.namespace();
    Error::UnsupportedState(format!(
        "namespace '{}' is {}, not {}",
        namespace.name, namespace.kind, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnType, DataType, EntityKind};
    use crate::event::{EventKind, MemoryListener};

    #[test]
    fn test_namespace_lifecycle() {
        let service = CatalogService::default();
        let public = service
            .add_namespace("public", NamespaceKind::Relational)
            .unwrap();
        let docs = service
            .add_namespace("docs", NamespaceKind::Document)
            .unwrap();
        assert_ne!(public.id, docs.id);
        assert_eq!(service.namespaces().len(), 2);

        let err = service
            .add_namespace("PUBLIC", NamespaceKind::Graph)
            .unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::DuplicateName {
                kind: ObjectKind::Namespace,
                ..
            })
        ));

        service.rename_namespace(docs.id, "documents").unwrap();
        assert_eq!(service.namespace_by_name("Documents").unwrap().id, docs.id);

        service.delete_namespace(docs.id).unwrap();
        assert!(service.namespace(docs.id).unwrap_err().is_not_found());
        assert!(service.delete_namespace(docs.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_wrong_kind_access() {
        let service = CatalogService::default();
        let docs = service
            .add_namespace("docs", NamespaceKind::Document)
            .unwrap();
        assert!(service.document(docs.id).is_ok());
        assert!(matches!(
            service.relational(docs.id).unwrap_err(),
            Error::UnsupportedState(_)
        ));
    }

    #[test]
    fn test_service_listener_sees_all_namespaces() {
        let service = CatalogService::default();
        let listener = MemoryListener::new();
        let subscription = service.subscribe(Arc::new(listener.clone()));

        let public = service
            .add_namespace("public", NamespaceKind::Relational)
            .unwrap();
        let relational = service.relational(public.id).unwrap();
        relational
            .add_table("users", EntityKind::Entity, true)
            .unwrap();

        assert_eq!(
            listener.summary(),
            vec![
                (ObjectKind::Namespace, EventKind::Created),
                (ObjectKind::Table, EventKind::Created),
            ]
        );

        assert!(service.unsubscribe(subscription));
        relational
            .add_table("orders", EntityKind::Entity, true)
            .unwrap();
        assert_eq!(listener.len(), 2);
        assert_eq!(service.version(), 3);
    }

    #[test]
    fn test_snapshot_cached_until_change() {
        let service = CatalogService::default();
        let public = service
            .add_namespace("public", NamespaceKind::Relational)
            .unwrap();
        let first = service.snapshot();
        let second = service.snapshot();
        assert!(Arc::ptr_eq(&first, &second));

        let relational = service.relational(public.id).unwrap();
        let users = relational
            .add_table("users", EntityKind::Entity, true)
            .unwrap();
        relational
            .add_column(users.id, "id", 0, ColumnType::new(DataType::BigInt), false, None)
            .unwrap();

        let third = service.snapshot();
        assert!(!Arc::ptr_eq(&second, &third));
        assert!(first.table(users.id).is_err());
        assert_eq!(third.columns(users.id).unwrap().len(), 1);
        assert!(third.version() > first.version());
    }

    #[test]
    fn test_image_roundtrip() {
        let service = CatalogService::default();
        let public = service
            .add_namespace("public", NamespaceKind::Relational)
            .unwrap();
        service
            .relational(public.id)
            .unwrap()
            .add_table("users", EntityKind::Entity, true)
            .unwrap();
        service.add_namespace("social", NamespaceKind::Graph).unwrap();

        let bytes = service.to_bytes().unwrap();
        let restored = CatalogService::from_bytes(&bytes, CatalogConfig::default()).unwrap();
        assert_eq!(restored.image(), service.image());
        assert_eq!(
            restored.id_builder().watermarks(),
            service.id_builder().watermarks()
        );
    }

    #[test]
    fn test_older_snapshot_never_replaces_newer() {
        let service = CatalogService::default();
        let newer = service.install(Arc::new(Snapshot::new(5, Vec::new())));
        let kept = service.install(Arc::new(Snapshot::new(3, Vec::new())));
        assert!(Arc::ptr_eq(&newer, &kept));
        assert_eq!(service.snapshot.read().as_ref().unwrap().version(), 5);
    }

    #[test]
    fn test_concurrent_snapshots_see_last_change() {
        let service = CatalogService::default();
        let public = service
            .add_namespace("public", NamespaceKind::Relational)
            .unwrap();
        let relational = service.relational(public.id).unwrap();

        std::thread::scope(|scope| {
            for writer in 0..4 {
                let relational = &relational;
                scope.spawn(move || {
                    for i in 0..25 {
                        relational
                            .add_table(&format!("t_{writer}_{i}"), EntityKind::Entity, true)
                            .unwrap();
                    }
                });
            }
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        service.snapshot();
                    }
                });
            }
        });

        let snapshot = service.snapshot();
        assert_eq!(snapshot.version(), service.version());
        assert_eq!(snapshot.relational(public.id).unwrap().tables().len(), 100);
    }

    #[test]
    fn test_image_records_allocation() {
        let service = CatalogService::new(
            CatalogConfig::new().with_id_allocation(IdAllocation::Unified),
        );
        service.add_namespace("public", NamespaceKind::Relational).unwrap();
        let image = service.image();
        assert_eq!(image.allocation, IdAllocation::Unified);

        let restored = CatalogService::from_image(image, CatalogConfig::default());
        let marks = restored.id_builder().watermarks();
        assert_eq!(restored.id_builder().allocation(), IdAllocation::PerCategory);
        assert_eq!(marks.field, marks.logical);
        assert_eq!(marks.key, marks.logical);
    }

    #[test]
    fn test_corrupt_image() {
        let err = CatalogService::from_bytes(&[1, 2, 3], CatalogConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
