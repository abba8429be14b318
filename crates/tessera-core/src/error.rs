//! Core error types.

use std::fmt;

use thiserror::Error;

use crate::ids::{ColumnId, KeyId, TableId};

/// Result alias used across the catalog.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kinds of catalog objects, used to qualify lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A namespace.
    Namespace,
    /// A relational table, view or materialized view.
    Table,
    /// A column of a table.
    Column,
    /// A key (column set) of a table.
    Key,
    /// A foreign key.
    ForeignKey,
    /// A constraint.
    Constraint,
    /// An index.
    Index,
    /// A document collection.
    Collection,
    /// A property graph.
    Graph,
    /// A graph alias.
    GraphAlias,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Namespace => "namespace",
            ObjectKind::Table => "table",
            ObjectKind::Column => "column",
            ObjectKind::Key => "key",
            ObjectKind::ForeignKey => "foreign key",
            ObjectKind::Constraint => "constraint",
            ObjectKind::Index => "index",
            ObjectKind::Collection => "collection",
            ObjectKind::Graph => "graph",
            ObjectKind::GraphAlias => "graph alias",
        };
        f.write_str(name)
    }
}

/// Structural invariants that a catalog call refused to break.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// A primary key may not contain nullable columns.
    #[error("primary key is not allowed to use nullable column '{column}'")]
    NullablePrimaryKeyColumn {
        /// Name of the offending column.
        column: String,
    },

    /// A table may not reference itself.
    #[error("table {table} cannot reference itself with a foreign key")]
    SelfReferencingForeignKey {
        /// The table id.
        table: TableId,
    },

    /// Referencing and referenced column types differ.
    #[error(
        "the data type of the referenced column '{referenced}' ({referenced_type}) does not \
         match the data type of the referencing column '{referencing}' ({referencing_type})"
    )]
    ForeignKeyTypeMismatch {
        /// Referencing column name.
        referencing: String,
        /// Referencing column type.
        referencing_type: String,
        /// Referenced column name.
        referenced: String,
        /// Referenced column type.
        referenced_type: String,
    },

    /// The referenced columns are not covered by a uniquely enforced key.
    #[error("the referenced columns of table {table} are not guaranteed to be unique")]
    ReferencedColumnsNotUnique {
        /// The referenced table id.
        table: TableId,
    },

    /// A UNIQUE constraint already exists on this key.
    #[error("there is already a unique constraint on key {key}")]
    DuplicateUniqueConstraint {
        /// The key id.
        key: KeyId,
    },

    /// A foreign key already exists over this column set.
    #[error("there is already a foreign key over key {key}")]
    DuplicateForeignKey {
        /// The key id.
        key: KeyId,
    },

    /// Removing this guarantee would leave a foreign key without a unique target.
    #[error(
        "key {key} is referenced by at least one foreign key which requires it to be unique; \
         drop the foreign key or create a unique constraint first"
    )]
    KeyRequiredByForeignKey {
        /// The key id.
        key: KeyId,
    },

    /// An object with this name already exists in the scope.
    #[error("{kind} '{name}' already exists")]
    DuplicateName {
        /// What kind of object collided.
        kind: ObjectKind,
        /// The colliding name.
        name: String,
    },

    /// A key needs at least one column.
    #[error("a key requires at least one column")]
    EmptyColumnList,

    /// A column appears more than once in a column list.
    #[error("column {column} is listed more than once")]
    DuplicateColumn {
        /// The repeated column id.
        column: ColumnId,
    },

    /// A column does not belong to the table it is used with.
    #[error("column {column} does not belong to table {table}")]
    ColumnNotInTable {
        /// The column id.
        column: ColumnId,
        /// The table id.
        table: TableId,
    },

    /// Referencing and referenced column lists differ in length.
    #[error("foreign key lists {referencing} referencing and {referenced} referenced columns")]
    ColumnCountMismatch {
        /// Number of referencing columns.
        referencing: usize,
        /// Number of referenced columns.
        referenced: usize,
    },

    /// The scale of a type exceeds its length.
    #[error("invalid scale {scale}: scale can not be larger than length {length}")]
    InvalidScale {
        /// Requested scale.
        scale: u32,
        /// Requested length.
        length: u32,
    },

    /// The column is still part of a key.
    #[error("column '{column}' is part of key {key}")]
    ColumnInUse {
        /// Column name.
        column: String,
        /// The key using it.
        key: KeyId,
    },

    /// The table is still referenced by a foreign key of another table.
    #[error("table {table} is referenced by foreign key '{foreign_key}'")]
    TableReferenced {
        /// The table id.
        table: TableId,
        /// Name of the referencing foreign key.
        foreign_key: String,
    },
}

/// Catalog errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A structural invariant would be broken.
    #[error("invariant violation: {0}")]
    InvariantViolation(#[from] Violation),

    /// An object id does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Object kind.
        kind: ObjectKind,
        /// Object id.
        id: u64,
    },

    /// An object name does not exist.
    #[error("{kind} '{name}' not found")]
    NameNotFound {
        /// Object kind.
        kind: ObjectKind,
        /// Object name.
        name: String,
    },

    /// The operation does not apply to the object in its current state.
    #[error("unsupported state: {0}")]
    UnsupportedState(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for an id lookup failure.
    pub fn not_found(kind: ObjectKind, id: u64) -> Self {
        Error::NotFound { kind, id }
    }

    /// Shorthand for a name lookup failure.
    pub fn name_not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Error::NameNotFound {
            kind,
            name: name.into(),
        }
    }

    /// Returns the violated invariant, if this is an invariant violation.
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Error::InvariantViolation(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this error is a lookup failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::NameNotFound { .. })
    }
}
