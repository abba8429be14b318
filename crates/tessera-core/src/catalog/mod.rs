//! Logical schema catalog.
//!
//! Records for namespaces, entities, columns, keys, constraints and indexes,
//! and one catalog type per data model holding them.

mod column;
mod constraint;
mod document;
mod entity;
mod graph;
mod index;
mod key;
mod namespace;
mod relational;
mod types;

pub use column::{Column, DefaultValue};
pub use constraint::Constraint;
pub use document::{DocumentCatalog, DocumentState};
pub use entity::{
    Collection, FieldCollation, Graph, MaterializedCriteria, Namespace, RefreshPolicy, Table,
    ViewDefinition,
};
pub use graph::{GraphCatalog, GraphState};
pub use index::{Index, IndexDef};
pub use key::{ForeignKey, ForeignKeyDef, Key, PrimaryKey};
pub use namespace::{NamespaceCatalog, NamespaceState};
pub use relational::{RelationalCatalog, RelationalState};
pub use types::{
    Collation, ColumnType, ConstraintKind, DataType, EnforcementTime, EntityKind,
    ForeignKeyOption, IndexType, NamespaceKind, QueryLanguage, SortDirection,
};
