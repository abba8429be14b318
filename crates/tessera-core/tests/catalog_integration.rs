//! Integration tests for the schema catalog.

use std::sync::Arc;

use tessera_core::{
    CatalogConfig, CatalogService, ColumnType, DataType, EntityKind, Error, EventKind,
    ForeignKeyDef, IdBuilder, IndexDef, MemoryListener, Namespace, NamespaceKind, ObjectKind,
    RelationalCatalog, Violation,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct TestContext {
    catalog: RelationalCatalog,
    listener: MemoryListener,
}

impl TestContext {
    fn new(config: CatalogConfig) -> Self {
        init_tracing();
        let ids = Arc::new(IdBuilder::new(config.id_allocation));
        let namespace = Namespace::new(0, "public", NamespaceKind::Relational, false);
        let catalog = RelationalCatalog::new(namespace, ids, &config);
        let listener = MemoryListener::new();
        catalog.subscribe(Arc::new(listener.clone()));
        Self { catalog, listener }
    }

    fn table(&self, name: &str) -> u64 {
        self.catalog
            .add_table(name, EntityKind::Entity, true)
            .unwrap()
            .id
    }

    fn column(&self, table: u64, name: &str, data_type: DataType, nullable: bool) -> u64 {
        let position = self.catalog.columns(table).len() as u32;
        self.catalog
            .add_column(table, name, position, ColumnType::new(data_type), nullable, None)
            .unwrap()
            .id
    }
}

/// Parent table with a primary key on `id` and a child table referencing it.
fn parent_child(ctx: &TestContext) -> (u64, u64, u64, u64) {
    let parent = ctx.table("parent");
    let parent_id = ctx.column(parent, "id", DataType::BigInt, false);
    ctx.catalog.add_primary_key(parent, &[parent_id]).unwrap();

    let child = ctx.table("child");
    let parent_ref = ctx.column(child, "parent_id", DataType::BigInt, true);
    let fk = ctx
        .catalog
        .add_foreign_key(
            child,
            ForeignKeyDef::new("fk_parent", vec![parent_ref], parent, vec![parent_id]),
        )
        .unwrap();
    (parent, child, parent_id, fk.id)
}

#[test]
fn test_unified_id_scenario() {
    let ctx = TestContext::new(CatalogConfig::new().with_id_allocation(
        tessera_core::IdAllocation::Unified,
    ));

    let table = ctx.table("t");
    assert_eq!(table, 1);
    let column = ctx.column(table, "c", DataType::Integer, false);
    assert_eq!(column, 2);

    let pk = ctx.catalog.add_primary_key(table, &[column]).unwrap();
    assert_eq!(pk.0.id, 3);
    let constraint = ctx
        .catalog
        .add_unique_constraint(table, "uq_c", &[column])
        .unwrap();
    assert_eq!(constraint.id, 4);
    assert_eq!(constraint.key_id, 3);
    assert_eq!(ctx.catalog.key_unique_count(3), 2);

    ctx.catalog.delete_primary_key(table).unwrap();
    assert!(ctx.catalog.key(3).is_ok());
    assert!(ctx.catalog.primary_key(table).is_none());

    ctx.catalog.delete_constraint(4).unwrap();
    assert!(ctx.catalog.key(3).unwrap_err().is_not_found());
    assert!(ctx.catalog.table_keys(table).is_empty());
}

#[test]
fn test_nullable_primary_key_column() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    let column = ctx.column(table, "c", DataType::Integer, true);

    let err = ctx.catalog.add_primary_key(table, &[column]).unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::NullablePrimaryKeyColumn { .. })
    ));
    assert!(ctx.catalog.table_keys(table).is_empty());
}

#[test]
fn test_key_deduplication_ignores_column_order() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    let a = ctx.column(table, "a", DataType::Integer, false);
    let b = ctx.column(table, "b", DataType::Integer, false);

    let pk = ctx.catalog.add_primary_key(table, &[a, b]).unwrap();
    let constraint = ctx
        .catalog
        .add_unique_constraint(table, "uq_ba", &[b, a])
        .unwrap();
    let index = ctx
        .catalog
        .add_index(table, IndexDef::new("idx_ab", vec![a, b]))
        .unwrap();

    assert_eq!(constraint.key_id, pk.0.id);
    assert_eq!(index.key_id, pk.0.id);
    assert_eq!(ctx.catalog.table_keys(table).len(), 1);
}

#[test]
fn test_self_referencing_foreign_key() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    let id = ctx.column(table, "id", DataType::BigInt, false);
    let parent = ctx.column(table, "parent", DataType::BigInt, true);
    ctx.catalog.add_primary_key(table, &[id]).unwrap();

    let err = ctx
        .catalog
        .add_foreign_key(table, ForeignKeyDef::new("fk_self", vec![parent], table, vec![id]))
        .unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::SelfReferencingForeignKey { .. })
    ));
}

#[test]
fn test_foreign_key_requires_unique_target() {
    let ctx = TestContext::new(CatalogConfig::default());
    let parent = ctx.table("parent");
    let code = ctx.column(parent, "code", DataType::Varchar, false);
    let child = ctx.table("child");
    let parent_code = ctx.column(child, "parent_code", DataType::Varchar, true);

    // A non-unique index does not make the columns unique
    ctx.catalog
        .add_index(parent, IndexDef::new("idx_code", vec![code]))
        .unwrap();
    let def = ForeignKeyDef::new("fk_code", vec![parent_code], parent, vec![code]);
    let err = ctx.catalog.add_foreign_key(child, def.clone()).unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::ReferencedColumnsNotUnique { .. })
    ));

    ctx.catalog
        .add_unique_constraint(parent, "uq_code", &[code])
        .unwrap();
    let fk = ctx.catalog.add_foreign_key(child, def).unwrap();
    assert_eq!(fk.referenced_table_id, parent);
    assert_eq!(ctx.catalog.exported_keys(parent).len(), 1);
    assert!(ctx.catalog.is_foreign_key(fk.referenced_key_id));
}

#[test]
fn test_foreign_key_type_mismatch() {
    let ctx = TestContext::new(CatalogConfig::default());
    let parent = ctx.table("parent");
    let id = ctx.column(parent, "id", DataType::BigInt, false);
    ctx.catalog.add_primary_key(parent, &[id]).unwrap();
    let child = ctx.table("child");
    let parent_id = ctx.column(child, "parent_id", DataType::Integer, true);

    let err = ctx
        .catalog
        .add_foreign_key(child, ForeignKeyDef::new("fk", vec![parent_id], parent, vec![id]))
        .unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::ForeignKeyTypeMismatch { .. })
    ));
    assert!(ctx.catalog.table_keys(child).is_empty());
}

#[test]
fn test_primary_key_removal_guard() {
    let ctx = TestContext::new(CatalogConfig::default());
    let (parent, _, parent_id, fk) = parent_child(&ctx);

    let err = ctx.catalog.delete_primary_key(parent).unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::KeyRequiredByForeignKey { .. })
    ));
    assert!(ctx.catalog.primary_key(parent).is_some());

    // A second guarantee on the same key lifts the guard
    ctx.catalog
        .add_unique_constraint(parent, "uq_id", &[parent_id])
        .unwrap();
    ctx.catalog.delete_primary_key(parent).unwrap();

    ctx.catalog.delete_foreign_key(fk).unwrap();
    assert!(ctx.catalog.foreign_key(fk).unwrap_err().is_not_found());
}

#[test]
fn test_table_drop_leaves_orphans_without_cascade() {
    let ctx = TestContext::new(CatalogConfig::default());
    let (parent, child, _, fk) = parent_child(&ctx);

    ctx.catalog.delete_table(child).unwrap();
    assert!(ctx.catalog.table(child).unwrap_err().is_not_found());
    assert!(ctx.catalog.columns(child).is_empty());
    // Keys and the foreign key of the dropped table stay behind
    assert!(ctx.catalog.key(fk).is_ok());
    assert!(ctx.catalog.foreign_key(fk).is_ok());
    assert_eq!(ctx.catalog.exported_keys(parent).len(), 1);
}

#[test]
fn test_table_drop_with_cascade() {
    let ctx = TestContext::new(CatalogConfig::new().with_cascade_table_drop(true));
    let (parent, child, _, fk) = parent_child(&ctx);

    let err = ctx.catalog.delete_table(parent).unwrap_err();
    assert!(matches!(
        err.violation(),
        Some(Violation::TableReferenced { .. })
    ));

    ctx.listener.clear();
    ctx.catalog.delete_table(child).unwrap();
    assert!(ctx.catalog.key(fk).unwrap_err().is_not_found());
    assert!(ctx.catalog.exported_keys(parent).is_empty());
    assert_eq!(
        ctx.listener.summary(),
        vec![
            (ObjectKind::ForeignKey, EventKind::Dropped),
            (ObjectKind::Key, EventKind::Dropped),
            (ObjectKind::Column, EventKind::Dropped),
            (ObjectKind::Table, EventKind::Dropped),
        ]
    );

    ctx.catalog.delete_table(parent).unwrap();
    assert!(ctx.catalog.keys().is_empty());
}

#[test]
fn test_primary_key_replacement_event_order() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    let a = ctx.column(table, "a", DataType::Integer, false);
    let b = ctx.column(table, "b", DataType::Integer, false);
    let first = ctx.catalog.add_primary_key(table, &[a]).unwrap();

    ctx.listener.clear();
    let second = ctx.catalog.add_primary_key(table, &[b]).unwrap();
    assert_ne!(first.0.id, second.0.id);
    assert!(ctx.catalog.key(first.0.id).unwrap_err().is_not_found());
    assert_eq!(
        ctx.listener.summary(),
        vec![
            (ObjectKind::Key, EventKind::Dropped),
            (ObjectKind::Key, EventKind::Created),
            (ObjectKind::Table, EventKind::Altered),
        ]
    );

    let events = ctx.listener.events();
    assert!(events.iter().all(|e| e.namespace_id == 0));
    assert!(events[2].old.is_some() && events[2].new.is_some());
}

#[test]
fn test_rejected_mutation_publishes_nothing() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    ctx.listener.clear();

    assert!(ctx.catalog.add_table("T", EntityKind::Entity, true).is_err());
    assert!(ctx
        .catalog
        .add_column(table, "c", 0, ColumnType::decimal(2, 5), true, None)
        .is_err());
    assert!(ctx.listener.is_empty());
}

#[test]
fn test_concurrent_key_deduplication() {
    let ctx = TestContext::new(CatalogConfig::default());
    let table = ctx.table("t");
    let a = ctx.column(table, "a", DataType::Integer, false);
    let b = ctx.column(table, "b", DataType::Integer, false);

    let key_ids: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let catalog = &ctx.catalog;
                scope.spawn(move || {
                    let columns = if i % 2 == 0 { vec![a, b] } else { vec![b, a] };
                    catalog
                        .add_index(table, IndexDef::new(format!("idx_{i}"), columns))
                        .unwrap()
                        .key_id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(key_ids.iter().all(|id| *id == key_ids[0]));
    assert_eq!(ctx.catalog.table_keys(table).len(), 1);
    assert_eq!(ctx.catalog.indexes(table, false).len(), 8);
    assert_eq!(ctx.listener.events_for(ObjectKind::Key).len(), 1);
}

#[test]
fn test_default_graph() {
    init_tracing();
    let service = CatalogService::default();
    let social = service.add_namespace("social", NamespaceKind::Graph).unwrap();
    let graphs = service.graph(social.id).unwrap();

    let default = graphs.default_graph().unwrap();
    assert_eq!(default.id, social.id);
    assert_eq!(default.name, "social");
    assert!(matches!(
        graphs.delete_graph(default.id).unwrap_err(),
        Error::UnsupportedState(_)
    ));

    service.rename_namespace(social.id, "network").unwrap();
    assert_eq!(graphs.default_graph().unwrap().name, "network");
    assert_eq!(graphs.graphs().len(), 1);
}

#[test]
fn test_graph_alias_storage() {
    init_tracing();
    let service = CatalogService::default();
    let social = service.add_namespace("social", NamespaceKind::Graph).unwrap();
    let graphs = service.graph(social.id).unwrap();
    let friends = graphs.add_graph("friends", true).unwrap();

    graphs.add_graph_alias(friends.id, "Pals", false).unwrap();
    assert_eq!(graphs.graph_by_alias("pals").unwrap().id, friends.id);
    assert!(graphs.add_graph_alias(friends.id, "PALS", true).is_ok());
    assert!(matches!(
        graphs.add_graph_alias(social.id, "pals", false).unwrap_err().violation(),
        Some(Violation::DuplicateName { kind: ObjectKind::GraphAlias, .. })
    ));

    let snapshot = service.snapshot();
    assert_eq!(snapshot.graph_by_alias(social.id, "Pals").unwrap().id, friends.id);

    assert!(graphs.remove_graph_alias(social.id, "pals", false).is_err());
    assert!(graphs.remove_graph_alias(social.id, "pals", true).is_ok());
    graphs.remove_graph_alias(friends.id, "pals", false).unwrap();
    assert!(graphs.graph_by_alias("pals").is_err());

    graphs.add_graph_alias(friends.id, "buddies", false).unwrap();
    graphs.delete_graph(friends.id).unwrap();
    assert!(graphs.graph_by_alias("buddies").is_err());
}

#[test]
fn test_snapshot_staleness() {
    init_tracing();
    let service = CatalogService::default();
    let public = service
        .add_namespace("public", NamespaceKind::Relational)
        .unwrap();
    let relational = service.relational(public.id).unwrap();

    let before = service.snapshot();
    let users = relational
        .add_table("users", EntityKind::Entity, true)
        .unwrap();
    assert!(before.table(users.id).is_err());

    let after = service.snapshot();
    assert_eq!(after.table(users.id).unwrap().name, "users");
    assert_eq!(
        after.table_by_name(public.id, "USERS").unwrap().id,
        users.id
    );
    assert!(Arc::ptr_eq(&after, &service.snapshot()));
}

#[test]
fn test_restore_continues_id_sequences() {
    init_tracing();
    let service = CatalogService::default();
    let public = service
        .add_namespace("public", NamespaceKind::Relational)
        .unwrap();
    let relational = service.relational(public.id).unwrap();
    let users = relational
        .add_table("users", EntityKind::Entity, true)
        .unwrap();
    let id = relational
        .add_column(users.id, "id", 0, ColumnType::new(DataType::BigInt), false, None)
        .unwrap();
    let pk = relational.add_primary_key(users.id, &[id.id]).unwrap();

    let bytes = service.to_bytes().unwrap();
    let restored = CatalogService::from_bytes(&bytes, CatalogConfig::default()).unwrap();

    let restored_public = restored.namespace_by_name("public").unwrap();
    assert_eq!(restored_public.id, public.id);
    let relational = restored.relational(public.id).unwrap();
    assert_eq!(relational.primary_key(users.id).unwrap().0.id, pk.0.id);

    let orders = relational
        .add_table("orders", EntityKind::Entity, true)
        .unwrap();
    assert!(orders.id > users.id);
    let docs = restored.add_namespace("docs", NamespaceKind::Document).unwrap();
    assert!(docs.id > orders.id);
    let column = relational
        .add_column(orders.id, "id", 0, ColumnType::new(DataType::BigInt), false, None)
        .unwrap();
    assert!(column.id > id.id);
}

#[test]
fn test_restore_under_other_allocation() {
    init_tracing();
    let service = CatalogService::default();
    let public = service
        .add_namespace("public", NamespaceKind::Relational)
        .unwrap();
    let relational = service.relational(public.id).unwrap();
    let users = relational
        .add_table("users", EntityKind::Entity, true)
        .unwrap();
    let old: Vec<u64> = ["a", "b", "c", "d"]
        .iter()
        .enumerate()
        .map(|(pos, name)| {
            relational
                .add_column(users.id, name, pos as u32, ColumnType::new(DataType::Integer), true, None)
                .unwrap()
                .id
        })
        .collect();

    // Issued per category, continued from one shared counter.
    let bytes = service.to_bytes().unwrap();
    let unified = CatalogConfig::new().with_id_allocation(tessera_core::IdAllocation::Unified);
    let restored = CatalogService::from_bytes(&bytes, unified).unwrap();
    let relational = restored.relational(public.id).unwrap();
    let e = relational
        .add_column(users.id, "e", 4, ColumnType::new(DataType::Integer), true, None)
        .unwrap();
    let orders = relational
        .add_table("orders", EntityKind::Entity, true)
        .unwrap();
    assert!(!old.contains(&e.id));
    assert!(orders.id > users.id);
    assert_eq!(relational.columns(users.id).len(), 5);
    for (id, name) in old.iter().zip(["a", "b", "c", "d"]) {
        assert_eq!(relational.column(*id).unwrap().name, name);
    }

    // And back again.
    let bytes = restored.to_bytes().unwrap();
    let restored = CatalogService::from_bytes(&bytes, CatalogConfig::default()).unwrap();
    let relational = restored.relational(public.id).unwrap();
    let f = relational
        .add_column(users.id, "f", 5, ColumnType::new(DataType::Integer), true, None)
        .unwrap();
    assert!(f.id > e.id);
    assert_eq!(relational.column(e.id).unwrap().name, "e");
    assert_eq!(relational.columns(users.id).len(), 6);
}
