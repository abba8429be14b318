//! Tessera Core - Logical schema catalog for a multi-model database.
//!
//! The catalog records the namespaces of a database and the objects inside
//! them: tables, columns, keys, constraints and indexes for relational
//! namespaces, collections for document namespaces and graphs for graph
//! namespaces. Every change is validated against the structural invariants
//! of the schema, published as a [`CatalogEvent`], and visible to readers
//! through an immutable [`Snapshot`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod ids;
pub mod service;
pub mod snapshot;

pub use catalog::{
    Collation, Collection, Column, ColumnType, Constraint, ConstraintKind, DataType,
    DefaultValue, DocumentCatalog, EnforcementTime, EntityKind, ForeignKey, ForeignKeyDef,
    ForeignKeyOption, Graph, GraphCatalog, Index, IndexDef, IndexType, Key, Namespace,
    NamespaceCatalog, NamespaceKind, NamespaceState, PrimaryKey, RelationalCatalog, Table,
    ViewDefinition,
};
pub use config::CatalogConfig;
pub use error::{Error, ObjectKind, Result, Violation};
pub use event::{
    CatalogEvent, CatalogListener, CatalogObject, EventBus, EventKind, MemoryListener,
    SubscriptionId, TracingListener,
};
pub use ids::{IdAllocation, IdBuilder, IdWatermarks};
pub use service::{CatalogImage, CatalogService};
pub use snapshot::Snapshot;
