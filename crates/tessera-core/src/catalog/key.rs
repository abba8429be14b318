//! Keys, primary keys and foreign keys.

use std::collections::HashSet;
use std::ops::Deref;

use rkyv::{Archive, Deserialize, Serialize};

use super::types::{EnforcementTime, ForeignKeyOption};
use crate::ids::{ColumnId, KeyId, NamespaceId, TableId};

/// Check whether two column lists cover the same set of columns.
pub(crate) fn same_column_set(a: &[ColumnId], b: &[ColumnId]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let left: HashSet<_> = a.iter().collect();
    let right: HashSet<_> = b.iter().collect();
    left == right
}

/// A de-duplicated column set of a table.
///
/// A table holds at most one key per distinct column set. Primary keys,
/// foreign keys, unique constraints and indexes over the same columns all
/// share it.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Key {
    /// Key id.
    pub id: KeyId,
    /// Owning table.
    pub table_id: TableId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Covered columns, in declaration order. Compared as a set.
    pub column_ids: Vec<ColumnId>,
    /// When uniqueness is enforced.
    pub enforcement: EnforcementTime,
}

impl Key {
    /// Check whether this key covers exactly `columns`, in any order.
    pub fn covers(&self, columns: &[ColumnId]) -> bool {
        same_column_set(&self.column_ids, columns)
    }

    /// Check whether `column` is part of this key.
    pub fn contains(&self, column: ColumnId) -> bool {
        self.column_ids.contains(&column)
    }
}

/// The key installed as a table's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey(pub Key);

impl Deref for PrimaryKey {
    type Target = Key;

    fn deref(&self) -> &Key {
        &self.0
    }
}

/// A foreign key. Its id is the id of the key over the referencing columns.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Id of the referencing key.
    pub id: KeyId,
    /// Constraint name.
    pub name: String,
    /// Referencing table.
    pub table_id: TableId,
    /// Namespace of the referencing table.
    pub namespace_id: NamespaceId,
    /// Referencing columns, aligned with `referenced_column_ids`.
    pub column_ids: Vec<ColumnId>,
    /// The referenced (uniquely enforced) key.
    pub referenced_key_id: KeyId,
    /// Referenced table.
    pub referenced_table_id: TableId,
    /// Namespace of the referenced table.
    pub referenced_namespace_id: NamespaceId,
    /// Referenced columns, aligned with `column_ids`.
    pub referenced_column_ids: Vec<ColumnId>,
    /// Action on update of a referenced row.
    pub on_update: ForeignKeyOption,
    /// Action on delete of a referenced row.
    pub on_delete: ForeignKeyOption,
}

impl ForeignKey {
    /// Pairs of (referencing, referenced) column ids.
    pub fn column_pairs(&self) -> impl Iterator<Item = (ColumnId, ColumnId)> + '_ {
        self.column_ids
            .iter()
            .copied()
            .zip(self.referenced_column_ids.iter().copied())
    }

    /// Check if this foreign key reaches into `table`.
    pub fn references(&self, table: TableId) -> bool {
        self.referenced_table_id == table
    }
}

/// Declaration of a foreign key, as handed to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    /// Constraint name.
    pub name: String,
    /// Referencing columns.
    pub column_ids: Vec<ColumnId>,
    /// Referenced table.
    pub referenced_table_id: TableId,
    /// Referenced columns, paired with `column_ids` by position.
    pub referenced_column_ids: Vec<ColumnId>,
    /// Action on update of a referenced row.
    pub on_update: ForeignKeyOption,
    /// Action on delete of a referenced row.
    pub on_delete: ForeignKeyOption,
}

impl ForeignKeyDef {
    /// Declare a foreign key with `RESTRICT` actions.
    pub fn new(
        name: impl Into<String>,
        column_ids: Vec<ColumnId>,
        referenced_table_id: TableId,
        referenced_column_ids: Vec<ColumnId>,
    ) -> Self {
        Self {
            name: name.into(),
            column_ids,
            referenced_table_id,
            referenced_column_ids,
            on_update: ForeignKeyOption::Restrict,
            on_delete: ForeignKeyOption::Restrict,
        }
    }

    /// Set the update action.
    pub fn on_update(mut self, option: ForeignKeyOption) -> Self {
        self.on_update = option;
        self
    }

    /// Set the delete action.
    pub fn on_delete(mut self, option: ForeignKeyOption) -> Self {
        self.on_delete = option;
        self
    }
}
