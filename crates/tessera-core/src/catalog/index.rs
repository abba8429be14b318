//! Index definitions.

use rkyv::{Archive, Deserialize, Serialize};

use super::types::IndexType;
use crate::ids::{AdapterId, ColumnId, IndexId, KeyId, TableId};

/// An index over a key.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Index {
    /// Index id.
    pub id: IndexId,
    /// Index name (unique within its table).
    pub name: String,
    /// The key the index is built over.
    pub key_id: KeyId,
    /// Table owning the key.
    pub table_id: TableId,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Adapter specific method name.
    pub method: String,
    /// Human readable method name.
    pub method_display_name: String,
    /// Index organisation.
    pub index_type: IndexType,
    /// Adapter holding the physical index.
    pub adapter_id: AdapterId,
    /// Name of the physical index, once created.
    pub physical_name: Option<String>,
}

impl Index {
    /// Copy with a physical name.
    pub fn with_physical_name(&self, physical_name: impl Into<String>) -> Self {
        Self {
            physical_name: Some(physical_name.into()),
            ..self.clone()
        }
    }

    /// Check if the physical index has been created.
    pub fn is_materialized(&self) -> bool {
        self.physical_name.is_some()
    }
}

/// Declaration of an index, as handed to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub column_ids: Vec<ColumnId>,
    /// Whether the index enforces uniqueness. Existing rows are not checked.
    pub unique: bool,
    /// Adapter specific method name.
    pub method: String,
    /// Human readable method name.
    pub method_display_name: String,
    /// Index organisation.
    pub index_type: IndexType,
    /// Adapter holding the physical index.
    pub adapter_id: AdapterId,
}

impl IndexDef {
    /// Declare a non-unique B-tree index on adapter 0.
    pub fn new(name: impl Into<String>, column_ids: Vec<ColumnId>) -> Self {
        Self {
            name: name.into(),
            column_ids,
            unique: false,
            method: "btree".to_string(),
            method_display_name: "B-Tree".to_string(),
            index_type: IndexType::BTree,
            adapter_id: 0,
        }
    }

    /// Set uniqueness.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Set the method and its display name.
    pub fn method(mut self, method: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.method = method.into();
        self.method_display_name = display_name.into();
        self
    }

    /// Set the index type.
    pub fn index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }

    /// Set the adapter.
    pub fn adapter(mut self, adapter_id: AdapterId) -> Self {
        self.adapter_id = adapter_id;
        self
    }
}
