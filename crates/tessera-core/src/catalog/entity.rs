//! Namespace and entity records.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use rkyv::{Archive, Deserialize, Serialize};

use super::types::{EntityKind, NamespaceKind, QueryLanguage, SortDirection};
use crate::ids::{ColumnId, EntityId, KeyId, NamespaceId, TableId};

/// Current time in microseconds since the Unix epoch.
pub(crate) fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Compare two names under the given case sensitivity.
pub(crate) fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// A named container for the entities of one data model.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Namespace {
    /// Namespace id.
    pub id: NamespaceId,
    /// Namespace name (unique within the catalog).
    pub name: String,
    /// Data model of the namespace.
    pub kind: NamespaceKind,
    /// Whether entity names are compared case sensitively.
    pub case_sensitive: bool,
}

impl Namespace {
    /// Create a namespace record.
    pub fn new(
        id: NamespaceId,
        name: impl Into<String>,
        kind: NamespaceKind,
        case_sensitive: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            case_sensitive,
        }
    }

    /// Check whether `name` refers to an object named `existing` in this namespace.
    pub fn matches(&self, existing: &str, name: &str) -> bool {
        names_match(existing, name, self.case_sensitive)
    }
}

/// Sort order of one output field of a view.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct FieldCollation {
    /// Position of the field in the view's output.
    pub field_index: u32,
    /// Sort direction.
    pub direction: SortDirection,
}

impl FieldCollation {
    /// Ascending order on a field.
    pub fn asc(field_index: u32) -> Self {
        Self {
            field_index,
            direction: SortDirection::Asc,
        }
    }

    /// Descending order on a field.
    pub fn desc(field_index: u32) -> Self {
        Self {
            field_index,
            direction: SortDirection::Desc,
        }
    }
}

/// When a materialized view is refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum RefreshPolicy {
    /// Only on explicit request.
    Manual,
    /// After a fixed interval.
    Interval {
        /// Interval in milliseconds.
        every_ms: u64,
    },
    /// After a number of updates to the underlying tables.
    Updates {
        /// Update threshold.
        count: u64,
    },
}

/// Refresh criteria of a materialized view.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct MaterializedCriteria {
    /// Refresh policy.
    pub policy: RefreshPolicy,
    /// Last refresh (microseconds since Unix epoch).
    pub last_refresh: Option<u64>,
}

impl MaterializedCriteria {
    /// Criteria for a view that is refreshed manually.
    pub fn manual() -> Self {
        Self {
            policy: RefreshPolicy::Manual,
            last_refresh: None,
        }
    }

    /// Criteria for a view refreshed every `every_ms` milliseconds.
    pub fn interval(every_ms: u64) -> Self {
        Self {
            policy: RefreshPolicy::Interval { every_ms },
            last_refresh: None,
        }
    }
}

/// Definition of a view or materialized view.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ViewDefinition {
    /// The defining query text.
    pub query: String,
    /// Language of the query.
    pub language: QueryLanguage,
    /// Sort order of the output.
    pub collation: Vec<FieldCollation>,
    /// Tables and columns the view reads.
    pub underlying_tables: HashMap<TableId, Vec<ColumnId>>,
    /// Whether the stored result keeps the output order.
    pub ordered: bool,
    /// Refresh criteria; set for materialized views only.
    pub materialized: Option<MaterializedCriteria>,
}

impl ViewDefinition {
    /// Create a definition for `query`.
    pub fn new(query: impl Into<String>, language: QueryLanguage) -> Self {
        Self {
            query: query.into(),
            language,
            collation: Vec::new(),
            underlying_tables: HashMap::new(),
            ordered: false,
            materialized: None,
        }
    }

    /// Record an underlying table and the columns read from it.
    pub fn with_underlying(mut self, table: TableId, columns: Vec<ColumnId>) -> Self {
        self.underlying_tables.insert(table, columns);
        self
    }

    /// Set the output order.
    pub fn with_collation(mut self, collation: Vec<FieldCollation>) -> Self {
        self.collation = collation;
        self
    }

    /// Attach refresh criteria.
    pub fn materialized(mut self, criteria: MaterializedCriteria, ordered: bool) -> Self {
        self.materialized = Some(criteria);
        self.ordered = ordered;
        self
    }
}

/// A relational entity: table, source, view or materialized view.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Table {
    /// Table id.
    pub id: TableId,
    /// Table name (unique within its namespace).
    pub name: String,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Whether the content may be modified.
    pub modifiable: bool,
    /// Key currently installed as primary key.
    pub primary_key: Option<KeyId>,
    /// Columns ordered by position, ties by id.
    pub column_ids: Vec<ColumnId>,
    /// Definition for views and materialized views.
    pub definition: Option<ViewDefinition>,
}

impl Table {
    /// Create a table record with no columns.
    pub fn new(
        id: TableId,
        name: impl Into<String>,
        namespace_id: NamespaceId,
        kind: EntityKind,
        modifiable: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            namespace_id,
            kind,
            modifiable,
            primary_key: None,
            column_ids: Vec::new(),
            definition: None,
        }
    }

    /// Check if this entity is a view of either flavour.
    pub fn is_view(&self) -> bool {
        self.kind.is_view()
    }

    /// Check if this entity can carry keys and constraints.
    pub fn accepts_constraints(&self) -> bool {
        matches!(self.kind, EntityKind::Entity | EntityKind::Source)
    }

    /// Refresh criteria, if this is a materialized view.
    pub fn materialized_criteria(&self) -> Option<&MaterializedCriteria> {
        self.definition.as_ref().and_then(|d| d.materialized.as_ref())
    }
}

/// A document collection.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Collection {
    /// Collection id.
    pub id: EntityId,
    /// Collection name (unique within its namespace).
    pub name: String,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Whether the content may be modified.
    pub modifiable: bool,
}

/// A property graph.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Graph {
    /// Graph id. The default graph shares the namespace id.
    pub id: EntityId,
    /// Graph name.
    pub name: String,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Whether the content may be modified.
    pub modifiable: bool,
}

impl Graph {
    /// Check if this is the default graph of its namespace.
    pub fn is_default(&self) -> bool {
        self.id == self.namespace_id
    }
}
