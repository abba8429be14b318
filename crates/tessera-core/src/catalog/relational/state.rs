//! Stored state of a relational namespace and its read access.

use std::collections::{HashMap, HashSet};

use rkyv::{Archive, Deserialize, Serialize};

use crate::catalog::{Column, Constraint, ForeignKey, Index, Key, Namespace, Table};
use crate::error::{Error, ObjectKind, Result, Violation};
use crate::ids::{ColumnId, ConstraintId, IndexId, KeyId, TableId};

/// Everything a relational namespace catalog stores.
///
/// This is also the exported form handed to snapshots and serialized with
/// the catalog image.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct RelationalState {
    pub(crate) namespace: Namespace,
    pub(crate) tables: HashMap<TableId, Table>,
    pub(crate) columns: HashMap<ColumnId, Column>,
    pub(crate) keys: HashMap<KeyId, Key>,
    /// Foreign keys by the id of their referencing key.
    pub(crate) foreign_keys: HashMap<KeyId, ForeignKey>,
    pub(crate) constraints: HashMap<ConstraintId, Constraint>,
    pub(crate) indexes: HashMap<IndexId, Index>,
}

fn sorted_by_id<'a, T, F>(items: impl Iterator<Item = &'a T>, id: F) -> Vec<&'a T>
where
    T: 'a,
    F: Fn(&T) -> u64,
{
    let mut items: Vec<_> = items.collect();
    items.sort_by_key(|item| id(*item));
    items
}

impl RelationalState {
    /// Empty state for a namespace.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            tables: HashMap::new(),
            columns: HashMap::new(),
            keys: HashMap::new(),
            foreign_keys: HashMap::new(),
            constraints: HashMap::new(),
            indexes: HashMap::new(),
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

    /// Get a table, view or materialized view.
    pub fn table(&self, id: TableId) -> Result<&Table> {
        self.tables
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Table, id))
    }

    /// Get a table by name, honouring the namespace case sensitivity.
    pub fn table_by_name(&self, name: &str) -> Result<&Table> {
        self.tables
            .values()
            .find(|t| self.namespace.matches(&t.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Table, name))
    }

    /// All tables ordered by id.
    pub fn tables(&self) -> Vec<&Table> {
        sorted_by_id(self.tables.values(), |t| t.id)
    }

    /// Get a column.
    pub fn column(&self, id: ColumnId) -> Result<&Column> {
        self.columns
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Column, id))
    }

    /// Get a column of a table by name.
    pub fn column_by_name(&self, table: TableId, name: &str) -> Result<&Column> {
        self.table(table)?;
        self.columns
            .values()
            .find(|c| c.table_id == table && self.namespace.matches(&c.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Column, name))
    }

    /// Columns of a table ordered by position.
    pub fn columns(&self, table: TableId) -> Vec<&Column> {
        let mut columns: Vec<_> = self
            .columns
            .values()
            .filter(|c| c.table_id == table)
            .collect();
        columns.sort_by_key(|c| (c.position, c.id));
        columns
    }

    /// Restore the position order of a table's column id list.
    pub(crate) fn sort_column_ids(&mut self, table: TableId) {
        let Some(mut ids) = self.tables.get(&table).map(|t| t.column_ids.clone()) else {
            return;
        };
        ids.sort_by_key(|id| {
            self.columns
                .get(id)
                .map_or((u32::MAX, *id), |c| (c.position, c.id))
        });
        if let Some(t) = self.tables.get_mut(&table) {
            t.column_ids = ids;
        }
    }

    /// Get a key.
    pub fn key(&self, id: KeyId) -> Result<&Key> {
        self.keys
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Key, id))
    }

    /// All keys ordered by id.
    pub fn keys(&self) -> Vec<&Key> {
        sorted_by_id(self.keys.values(), |k| k.id)
    }

    /// Keys of a table ordered by id.
    pub fn table_keys(&self, table: TableId) -> Vec<&Key> {
        sorted_by_id(self.keys.values().filter(|k| k.table_id == table), |k| k.id)
    }

    /// The primary key of a table.
    pub fn primary_key(&self, table: TableId) -> Option<&Key> {
        self.tables
            .get(&table)
            .and_then(|t| t.primary_key)
            .and_then(|id| self.keys.get(&id))
    }

    /// Get a foreign key by the id of its referencing key.
    pub fn foreign_key(&self, id: KeyId) -> Result<&ForeignKey> {
        self.foreign_keys
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::ForeignKey, id))
    }

    /// Foreign keys declared on a table (imported keys).
    pub fn foreign_keys(&self, table: TableId) -> Vec<&ForeignKey> {
        sorted_by_id(
            self.foreign_keys.values().filter(|fk| fk.table_id == table),
            |fk| fk.id,
        )
    }

    /// Foreign keys of other tables that reference a table.
    pub fn exported_keys(&self, table: TableId) -> Vec<&ForeignKey> {
        sorted_by_id(
            self.foreign_keys.values().filter(|fk| fk.references(table)),
            |fk| fk.id,
        )
    }

    /// Get a foreign key of a table by name.
    pub fn foreign_key_by_name(&self, table: TableId, name: &str) -> Result<&ForeignKey> {
        self.foreign_keys
            .values()
            .find(|fk| fk.table_id == table && self.namespace.matches(&fk.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::ForeignKey, name))
    }

    /// Get a constraint.
    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.constraints
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Constraint, id))
    }

    /// Constraints of a table.
    pub fn constraints(&self, table: TableId) -> Vec<&Constraint> {
        sorted_by_id(
            self.constraints.values().filter(|c| c.table_id == table),
            |c| c.id,
        )
    }

    /// Get a constraint of a table by name.
    pub fn constraint_by_name(&self, table: TableId, name: &str) -> Result<&Constraint> {
        self.constraints
            .values()
            .find(|c| c.table_id == table && self.namespace.matches(&c.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Constraint, name))
    }

    /// Get an index.
    pub fn index(&self, id: IndexId) -> Result<&Index> {
        self.indexes
            .get(&id)
            .ok_or_else(|| Error::not_found(ObjectKind::Index, id))
    }

    /// Indexes of a table, optionally only the unique ones.
    pub fn indexes(&self, table: TableId, only_unique: bool) -> Vec<&Index> {
        sorted_by_id(
            self.indexes
                .values()
                .filter(|i| i.table_id == table && (!only_unique || i.unique)),
            |i| i.id,
        )
    }

    /// Get an index of a table by name.
    pub fn index_by_name(&self, table: TableId, name: &str) -> Result<&Index> {
        self.indexes
            .values()
            .find(|i| i.table_id == table && self.namespace.matches(&i.name, name))
            .ok_or_else(|| Error::name_not_found(ObjectKind::Index, name))
    }

    /// Check if a key is the primary key of its table.
    pub fn is_primary_key(&self, key: KeyId) -> bool {
        self.keys
            .get(&key)
            .and_then(|k| self.tables.get(&k.table_id))
            .is_some_and(|t| t.primary_key == Some(key))
    }

    /// Check if a key is referenced by a foreign key.
    pub fn is_foreign_key(&self, key: KeyId) -> bool {
        self.referencing_foreign_key(key).is_some()
    }

    /// Check if an index is built over a key.
    pub fn is_index(&self, key: KeyId) -> bool {
        self.indexes.values().any(|i| i.key_id == key)
    }

    /// Check if a constraint is bound to a key.
    pub fn is_constraint(&self, key: KeyId) -> bool {
        self.constraints.values().any(|c| c.key_id == key)
    }

    /// Number of independent uniqueness guarantees of a key: being the
    /// primary key, a UNIQUE constraint and each unique index.
    pub fn key_unique_count(&self, key: KeyId) -> usize {
        let primary = usize::from(self.is_primary_key(key));
        let constraints = self
            .constraints
            .values()
            .filter(|c| c.key_id == key && c.is_unique())
            .count();
        let indexes = self
            .indexes
            .values()
            .filter(|i| i.key_id == key && i.unique)
            .count();
        primary + constraints + indexes
    }

    /// A foreign key that references `key`, if any.
    pub(crate) fn referencing_foreign_key(&self, key: KeyId) -> Option<&ForeignKey> {
        self.foreign_keys
            .values()
            .find(|fk| fk.referenced_key_id == key)
    }

    /// Fail if removing one uniqueness guarantee of `key` would leave a
    /// referencing foreign key without a unique target.
    pub(crate) fn check_unique_removal(&self, key: KeyId) -> Result<()> {
        if self.is_foreign_key(key) && self.key_unique_count(key) < 2 {
            return Err(Violation::KeyRequiredByForeignKey { key }.into());
        }
        Ok(())
    }

    /// Validate a column list used to build a key on `table`.
    pub(crate) fn validate_columns(&self, table: TableId, columns: &[ColumnId]) -> Result<()> {
        if columns.is_empty() {
            return Err(Violation::EmptyColumnList.into());
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for &column in columns {
            if !seen.insert(column) {
                return Err(Violation::DuplicateColumn { column }.into());
            }
            match self.columns.get(&column) {
                Some(c) if c.table_id == table => {}
                Some(_) => return Err(Violation::ColumnNotInTable { column, table }.into()),
                None => return Err(Error::not_found(ObjectKind::Column, column)),
            }
        }
        Ok(())
    }

    /// Fail if another table of the namespace already uses `name`.
    pub(crate) fn check_table_name(&self, name: &str, except: Option<TableId>) -> Result<()> {
        let taken = self
            .tables
            .values()
            .any(|t| Some(t.id) != except && self.namespace.matches(&t.name, name));
        if taken {
            return Err(Violation::DuplicateName {
                kind: ObjectKind::Table,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Fail if another column of the table already uses `name`.
    pub(crate) fn check_column_name(
        &self,
        table: TableId,
        name: &str,
        except: Option<ColumnId>,
    ) -> Result<()> {
        let taken = self.columns.values().any(|c| {
            c.table_id == table && Some(c.id) != except && self.namespace.matches(&c.name, name)
        });
        if taken {
            return Err(Violation::DuplicateName {
                kind: ObjectKind::Column,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Fail if a constraint, foreign key or index of the table already uses `name`.
    pub(crate) fn check_key_name(
        &self,
        table: TableId,
        kind: ObjectKind,
        name: &str,
    ) -> Result<()> {
        let matches = |candidate: &str| self.namespace.matches(candidate, name);
        let taken = match kind {
            ObjectKind::Constraint => self
                .constraints
                .values()
                .any(|c| c.table_id == table && matches(&c.name)),
            ObjectKind::ForeignKey => self
                .foreign_keys
                .values()
                .any(|fk| fk.table_id == table && matches(&fk.name)),
            ObjectKind::Index => self
                .indexes
                .values()
                .any(|i| i.table_id == table && matches(&i.name)),
            _ => false,
        };
        if taken {
            return Err(Violation::DuplicateName {
                kind,
                name: name.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
