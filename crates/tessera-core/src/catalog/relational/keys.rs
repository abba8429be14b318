//! Key registry.
//!
//! A table holds at most one [`Key`] per distinct column set. Every primary
//! key, foreign key, unique constraint and index declaration resolves its
//! columns to that shared key, and the key is pruned once the last
//! declaration using it is gone.

use tracing::{debug, instrument};

use super::RelationalState;
use crate::catalog::{EnforcementTime, Key};
use crate::event::{CatalogObject, ChangeSet};
use crate::ids::{ColumnId, IdBuilder, KeyId, TableId};

impl RelationalState {
    /// The key of `table` covering exactly `columns`, in any order.
    pub fn find_key(&self, table: TableId, columns: &[ColumnId]) -> Option<&Key> {
        self.keys
            .values()
            .find(|k| k.table_id == table && k.covers(columns))
    }

    /// Resolve the key over `columns`, creating it when absent.
    ///
    /// The lookup runs against the locked live state, so two callers racing
    /// on the same column set end up sharing one key.
    #[instrument(level = "debug", skip(self, ids, changes))]
    pub(crate) fn get_or_add_key(
        &mut self,
        table: TableId,
        columns: &[ColumnId],
        enforcement: EnforcementTime,
        ids: &IdBuilder,
        changes: &mut ChangeSet,
    ) -> KeyId {
        if let Some(key) = self.find_key(table, columns) {
            return key.id;
        }

        let key = Key {
            id: ids.next_key_id(),
            table_id: table,
            namespace_id: self.namespace.id,
            column_ids: columns.to_vec(),
            enforcement,
        };
        let id = key.id;
        debug!(key_id = id, table_id = table, "key created");
        changes.created(CatalogObject::Key(key.clone()));
        self.keys.insert(id, key);
        id
    }

    /// Check whether anything still refers to `key`.
    pub(crate) fn key_in_use(&self, key: KeyId) -> bool {
        self.is_primary_key(key)
            || self.is_constraint(key)
            || self.foreign_keys.contains_key(&key)
            || self.is_index(key)
    }

    /// Remove `key` unless a primary key, constraint, foreign key or index
    /// still uses it.
    #[instrument(level = "debug", skip(self, changes))]
    pub(crate) fn delete_key_if_no_longer_used(&mut self, key: KeyId, changes: &mut ChangeSet) {
        if self.key_in_use(key) {
            return;
        }
        if let Some(removed) = self.keys.remove(&key) {
            debug!(key_id = key, table_id = removed.table_id, "unused key removed");
            changes.dropped(CatalogObject::Key(removed));
        }
    }
}
