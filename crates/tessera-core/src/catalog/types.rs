//! Core type definitions for the catalog.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

/// Base data types a column can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum DataType {
    /// Boolean value.
    Boolean,
    /// 8-bit signed integer.
    TinyInt,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer.
    BigInt,
    /// Fixed-precision decimal.
    Decimal,
    /// 32-bit floating point.
    Real,
    /// 64-bit floating point.
    Double,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp.
    Timestamp,
    /// Fixed-length character string.
    Char,
    /// Variable-length character string.
    Varchar,
    /// Unbounded text.
    Text,
    /// Fixed-length binary.
    Binary,
    /// Variable-length binary.
    Varbinary,
    /// JSON document.
    Json,
    /// Array collection.
    Array,
    /// Map collection.
    Map,
    /// Graph node.
    Node,
    /// Graph edge.
    Edge,
    /// Graph path.
    Path,
    /// Nested document.
    Document,
}

impl DataType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Decimal
                | DataType::Real
                | DataType::Double
        )
    }

    /// Check if this type is a character type (and thus takes a collation).
    pub fn is_character(&self) -> bool {
        matches!(self, DataType::Char | DataType::Varchar | DataType::Text)
    }

    /// Check if this type is a collection type.
    pub fn is_collection(&self) -> bool {
        matches!(self, DataType::Array | DataType::Map)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "BOOLEAN",
            DataType::TinyInt => "TINYINT",
            DataType::SmallInt => "SMALLINT",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::Decimal => "DECIMAL",
            DataType::Real => "REAL",
            DataType::Double => "DOUBLE",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Char => "CHAR",
            DataType::Varchar => "VARCHAR",
            DataType::Text => "TEXT",
            DataType::Binary => "BINARY",
            DataType::Varbinary => "VARBINARY",
            DataType::Json => "JSON",
            DataType::Array => "ARRAY",
            DataType::Map => "MAP",
            DataType::Node => "NODE",
            DataType::Edge => "EDGE",
            DataType::Path => "PATH",
            DataType::Document => "DOCUMENT",
        };
        f.write_str(name)
    }
}

/// Declared type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ColumnType {
    /// Base type. For collections this is the element type.
    pub base: DataType,
    /// Collection wrapper, if any.
    pub collection: Option<DataType>,
    /// Length or precision.
    pub length: Option<u32>,
    /// Digits after the decimal point.
    pub scale: Option<u32>,
    /// Collection dimension.
    pub dimension: Option<u32>,
    /// Collection cardinality.
    pub cardinality: Option<u32>,
}

impl ColumnType {
    /// Create a plain type without modifiers.
    pub fn new(base: DataType) -> Self {
        Self {
            base,
            collection: None,
            length: None,
            scale: None,
            dimension: None,
            cardinality: None,
        }
    }

    /// Create a character type with a length.
    pub fn varchar(length: u32) -> Self {
        Self::new(DataType::Varchar).with_length(length)
    }

    /// Create a decimal type.
    pub fn decimal(precision: u32, scale: u32) -> Self {
        Self::new(DataType::Decimal)
            .with_length(precision)
            .with_scale(scale)
    }

    /// Create an array of `base`.
    pub fn array(base: DataType, dimension: u32, cardinality: u32) -> Self {
        Self {
            collection: Some(DataType::Array),
            dimension: Some(dimension),
            cardinality: Some(cardinality),
            ..Self::new(base)
        }
    }

    /// Set the length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the scale.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Check if the type is a collection.
    pub fn is_collection(&self) -> bool {
        self.collection.is_some()
    }
}

impl From<DataType> for ColumnType {
    fn from(base: DataType) -> Self {
        Self::new(base)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        match (self.length, self.scale) {
            (Some(length), Some(scale)) => write!(f, "({}, {})", length, scale)?,
            (Some(length), None) => write!(f, "({})", length)?,
            _ => {}
        }
        if let Some(collection) = self.collection {
            write!(f, " {}", collection)?;
        }
        Ok(())
    }
}

/// Character collation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum Collation {
    /// Case sensitive comparison.
    CaseSensitive,
    /// Case insensitive comparison.
    #[default]
    CaseInsensitive,
}

/// Data model of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum NamespaceKind {
    /// Tables and columns.
    Relational,
    /// Collections of documents.
    Document,
    /// Property graphs.
    Graph,
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceKind::Relational => write!(f, "relational"),
            NamespaceKind::Document => write!(f, "document"),
            NamespaceKind::Graph => write!(f, "graph"),
        }
    }
}

/// What an entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum EntityKind {
    /// An ordinary, stored entity.
    Entity,
    /// A read-only entity backed by an external source.
    Source,
    /// A view over other entities.
    View,
    /// A view whose result is stored.
    MaterializedView,
}

impl EntityKind {
    /// Check if this is a view of either flavour.
    pub fn is_view(&self) -> bool {
        matches!(self, EntityKind::View | EntityKind::MaterializedView)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Entity => write!(f, "entity"),
            EntityKind::Source => write!(f, "source"),
            EntityKind::View => write!(f, "view"),
            EntityKind::MaterializedView => write!(f, "materialized view"),
        }
    }
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ForeignKeyOption {
    /// Propagate the change to referencing rows.
    Cascade,
    /// Reject the change while referencing rows exist.
    #[default]
    Restrict,
    /// Set referencing columns to null.
    SetNull,
    /// Set referencing columns to their default.
    SetDefault,
}

/// Kind of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Values of the key columns are unique.
    Unique,
}

/// When a key is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum EnforcementTime {
    /// Checked while executing the statement.
    OnQuery,
    /// Checked when the transaction commits.
    OnCommit,
}

/// Physical organisation of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum IndexType {
    /// Ordered tree index.
    #[default]
    BTree,
    /// Hash index.
    Hash,
}

/// Language a view was defined in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
pub enum QueryLanguage {
    /// SQL.
    Sql,
    /// Mongo query language.
    Mql,
    /// Cypher.
    Cypher,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}
