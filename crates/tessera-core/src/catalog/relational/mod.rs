//! Relational namespace catalog.
//!
//! Holds the tables, views, columns, keys, foreign keys, constraints and
//! indexes of one relational namespace. All state sits behind a single
//! `RwLock`; every mutation validates first, mutates inside one write-lock
//! scope and publishes its change events after the lock is released.

mod keys;
mod state;

pub use state::RelationalState;

use std::sync::Arc;

use dashmap::DashSet;
use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, instrument, warn};

use super::entity::current_timestamp;
use super::{
    Collation, Column, ColumnType, Constraint, DefaultValue, EnforcementTime, EntityKind,
    ForeignKey, ForeignKeyDef, Index, IndexDef, Key, Namespace, PrimaryKey, Table,
    ViewDefinition,
};
use crate::config::CatalogConfig;
use crate::error::{Error, ObjectKind, Result, Violation};
use crate::event::{
    CatalogListener, CatalogObject, ChangeSet, EventBus, EventKind, SubscriptionId,
};
use crate::ids::{ColumnId, ConstraintId, IdBuilder, IndexId, KeyId, NamespaceId, TableId};

/// Check that scale does not exceed length.
fn validate_type(column_type: &ColumnType) -> Result<()> {
    if let (Some(length), Some(scale)) = (column_type.length, column_type.scale) {
        if scale > length {
            return Err(Violation::InvalidScale { scale, length }.into());
        }
    }
    Ok(())
}

/// Types are compatible for a foreign key when base and collection match.
fn same_type(a: &ColumnType, b: &ColumnType) -> bool {
    a.base == b.base && a.collection == b.collection
}

fn type_mismatch(referencing: &Column, referenced: &Column) -> Error {
    Violation::ForeignKeyTypeMismatch {
        referencing: referencing.name.clone(),
        referencing_type: referencing.column_type.to_string(),
        referenced: referenced.name.clone(),
        referenced_type: referenced.column_type.to_string(),
    }
    .into()
}

fn ensure_accepts_constraints(table: &Table) -> Result<()> {
    if !table.accepts_constraints() {
        return Err(Error::UnsupportedState(format!(
            "{} '{}' cannot carry keys or constraints",
            table.kind, table.name
        )));
    }
    Ok(())
}

/// Catalog of one relational namespace.
#[derive(Debug)]
pub struct RelationalCatalog {
    namespace_id: NamespaceId,
    state: RwLock<RelationalState>,
    /// Held from the start of a mutation until its events are delivered.
    publish_order: ReentrantMutex<()>,
    ids: Arc<IdBuilder>,
    cascade_table_drop: bool,
    flagged_for_deletion: DashSet<TableId>,
    bus: EventBus,
}

impl RelationalCatalog {
    /// Create an empty catalog for `namespace`.
    pub fn new(namespace: Namespace, ids: Arc<IdBuilder>, config: &CatalogConfig) -> Self {
        Self::from_state(RelationalState::new(namespace), ids, config)
    }

    /// Create a catalog over previously exported state.
    pub fn from_state(
        state: RelationalState,
        ids: Arc<IdBuilder>,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            namespace_id: state.namespace.id,
            state: RwLock::new(state),
            publish_order: ReentrantMutex::new(()),
            ids,
            cascade_table_drop: config.cascade_table_drop,
            flagged_for_deletion: DashSet::new(),
            bus: EventBus::new(),
        }
    }

    /// Id of the namespace.
    pub fn id(&self) -> NamespaceId {
        self.namespace_id
    }

    /// The event bus of this catalog.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: Arc<dyn CatalogListener>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    /// Clone the whole state under one read lock.
    pub fn export(&self) -> RelationalState {
        self.state.read().clone()
    }

    /// Independent copy through a serialization roundtrip. The copy shares
    /// the id builder but has its own, empty event bus.
    pub fn copy(&self) -> Result<Self> {
        let bytes = self.state.read().to_bytes()?;
        let state = RelationalState::from_bytes(&bytes)?;
        Ok(Self {
            namespace_id: self.namespace_id,
            state: RwLock::new(state),
            publish_order: ReentrantMutex::new(()),
            ids: self.ids.clone(),
            cascade_table_drop: self.cascade_table_drop,
            flagged_for_deletion: DashSet::new(),
            bus: EventBus::new(),
        })
    }

    /// Run a mutation under the write lock and publish its events once the
    /// lock is released. Nothing is published when the mutation fails.
    ///
    /// Mutations of one catalog are serialized up to event delivery, so
    /// listeners see events in mutation order. A listener may mutate the
    /// catalog it is called from.
    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut RelationalState, &mut ChangeSet) -> Result<T>,
    ) -> Result<T> {
        let _order = self.publish_order.lock();
        let mut changes = ChangeSet::new(self.namespace_id);
        let result = {
            let mut state = self.state.write();
            f(&mut *state, &mut changes)
        };
        match result {
            Ok(value) => {
                self.bus.publish_all(changes.into_events());
                Ok(value)
            }
            Err(e) => {
                if e.violation().is_some() {
                    warn!(
                        namespace_id = self.namespace_id,
                        operation,
                        error = %e,
                        "catalog mutation rejected"
                    );
                } else {
                    debug!(
                        namespace_id = self.namespace_id,
                        operation,
                        error = %e,
                        "catalog mutation failed"
                    );
                }
                Err(e)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&RelationalState) -> T) -> T {
        f(&*self.state.read())
    }

    pub(crate) fn rename_namespace(&self, name: &str) -> Result<Namespace> {
        self.mutate("rename_namespace", |state, changes| {
            let old = state.namespace.clone();
            state.namespace.name = name.to_string();
            changes.changed(
                EventKind::Renamed,
                CatalogObject::Namespace(old),
                CatalogObject::Namespace(state.namespace.clone()),
            );
            Ok(state.namespace.clone())
        })
    }

    // ----- entities -----

    fn insert_table(
        &self,
        state: &mut RelationalState,
        changes: &mut ChangeSet,
        table: Table,
    ) -> Table {
        debug!(
            namespace_id = self.namespace_id,
            table_id = table.id,
            name = %table.name,
            kind = %table.kind,
            "table created"
        );
        changes.created(CatalogObject::Table(table.clone()));
        state.tables.insert(table.id, table.clone());
        table
    }

    /// Create a table or source.
    pub fn add_table(&self, name: &str, kind: EntityKind, modifiable: bool) -> Result<Table> {
        if kind.is_view() {
            return Err(Error::UnsupportedState(format!(
                "{} '{}' requires a view definition",
                kind, name
            )));
        }
        self.mutate("add_table", |state, changes| {
            state.check_table_name(name, None)?;
            let table = Table::new(
                self.ids.next_entity_id(),
                name,
                self.namespace_id,
                kind,
                modifiable,
            );
            Ok(self.insert_table(state, changes, table))
        })
    }

    /// Create a view.
    pub fn add_view(
        &self,
        name: &str,
        modifiable: bool,
        definition: ViewDefinition,
    ) -> Result<Table> {
        if definition.materialized.is_some() {
            return Err(Error::UnsupportedState(format!(
                "view '{}' has refresh criteria; create it as a materialized view",
                name
            )));
        }
        self.mutate("add_view", |state, changes| {
            state.check_table_name(name, None)?;
            let mut table = Table::new(
                self.ids.next_entity_id(),
                name,
                self.namespace_id,
                EntityKind::View,
                modifiable,
            );
            table.definition = Some(definition);
            Ok(self.insert_table(state, changes, table))
        })
    }

    /// Create a materialized view. The definition must carry refresh criteria.
    pub fn add_materialized_view(&self, name: &str, definition: ViewDefinition) -> Result<Table> {
        if definition.materialized.is_none() {
            return Err(Error::UnsupportedState(format!(
                "materialized view '{}' has no refresh criteria",
                name
            )));
        }
        self.mutate("add_materialized_view", |state, changes| {
            state.check_table_name(name, None)?;
            let mut table = Table::new(
                self.ids.next_entity_id(),
                name,
                self.namespace_id,
                EntityKind::MaterializedView,
                false,
            );
            table.definition = Some(definition);
            Ok(self.insert_table(state, changes, table))
        })
    }

    /// Rename a table.
    pub fn rename_table(&self, table: TableId, name: &str) -> Result<Table> {
        self.mutate("rename_table", |state, changes| {
            let old = state.table(table)?.clone();
            state.check_table_name(name, Some(table))?;
            let new = Table {
                name: name.to_string(),
                ..old.clone()
            };
            debug!(table_id = table, from = %old.name, to = %new.name, "table renamed");
            state.tables.insert(table, new.clone());
            changes.changed(
                EventKind::Renamed,
                CatalogObject::Table(old),
                CatalogObject::Table(new.clone()),
            );
            Ok(new)
        })
    }

    /// Drop a table.
    ///
    /// Without cascading the table and its columns are removed and its keys,
    /// foreign keys, constraints and indexes stay behind. With cascading they
    /// are removed too, and the drop fails while another table still
    /// references this one.
    pub fn delete_table(&self, table: TableId) -> Result<()> {
        let cascade = self.cascade_table_drop;
        self.mutate("delete_table", |state, changes| {
            let removed = state.table(table)?.clone();

            if cascade {
                if let Some(fk) = state
                    .exported_keys(table)
                    .into_iter()
                    .find(|fk| fk.table_id != table)
                {
                    return Err(Violation::TableReferenced {
                        table,
                        foreign_key: fk.name.clone(),
                    }
                    .into());
                }

                let foreign_keys: Vec<_> =
                    state.foreign_keys(table).iter().map(|fk| fk.id).collect();
                for id in foreign_keys {
                    if let Some(fk) = state.foreign_keys.remove(&id) {
                        changes.dropped(CatalogObject::ForeignKey(fk));
                    }
                }
                let constraints: Vec<_> =
                    state.constraints(table).iter().map(|c| c.id).collect();
                for id in constraints {
                    if let Some(constraint) = state.constraints.remove(&id) {
                        changes.dropped(CatalogObject::Constraint(constraint));
                    }
                }
                let indexes: Vec<_> =
                    state.indexes(table, false).iter().map(|i| i.id).collect();
                for id in indexes {
                    if let Some(index) = state.indexes.remove(&id) {
                        changes.dropped(CatalogObject::Index(index));
                    }
                }
                let keys: Vec<_> = state.table_keys(table).iter().map(|k| k.id).collect();
                for id in keys {
                    if let Some(key) = state.keys.remove(&id) {
                        changes.dropped(CatalogObject::Key(key));
                    }
                }
            }

            let columns: Vec<_> = state.columns(table).iter().map(|c| c.id).collect();
            for id in columns {
                if let Some(column) = state.columns.remove(&id) {
                    changes.dropped(CatalogObject::Column(column));
                }
            }
            state.tables.remove(&table);
            debug!(
                namespace_id = self.namespace_id,
                table_id = table,
                name = %removed.name,
                cascade,
                "table dropped"
            );
            changes.dropped(CatalogObject::Table(removed));
            Ok(())
        })?;
        self.flagged_for_deletion.remove(&table);
        Ok(())
    }

    /// Set the last refresh time of a materialized view to now.
    pub fn update_materialized_view_refresh_time(&self, table: TableId) -> Result<Table> {
        self.mutate("update_materialized_view_refresh_time", |state, changes| {
            let old = state.table(table)?.clone();
            let mut new = old.clone();
            match new
                .definition
                .as_mut()
                .and_then(|d| d.materialized.as_mut())
            {
                Some(criteria) if old.kind == EntityKind::MaterializedView => {
                    criteria.last_refresh = Some(current_timestamp());
                }
                _ => {
                    return Err(Error::UnsupportedState(format!(
                        "{} '{}' is not a materialized view",
                        old.kind, old.name
                    )))
                }
            }
            state.tables.insert(table, new.clone());
            changes.changed(
                EventKind::Altered,
                CatalogObject::Table(old),
                CatalogObject::Table(new.clone()),
            );
            Ok(new)
        })
    }

    /// Mark or unmark a table as about to be dropped.
    pub fn flag_table_for_deletion(&self, table: TableId, flag: bool) -> Result<()> {
        self.read(|state| state.table(table).map(|_| ()))?;
        if flag {
            self.flagged_for_deletion.insert(table);
        } else {
            self.flagged_for_deletion.remove(&table);
        }
        Ok(())
    }

    /// Check if a table is marked as about to be dropped.
    pub fn is_table_flagged_for_deletion(&self, table: TableId) -> bool {
        self.flagged_for_deletion.contains(&table)
    }

    // ----- columns -----

    /// Add a column to a table.
    pub fn add_column(
        &self,
        table: TableId,
        name: &str,
        position: u32,
        column_type: ColumnType,
        nullable: bool,
        collation: Option<Collation>,
    ) -> Result<Column> {
        validate_type(&column_type)?;
        self.mutate("add_column", |state, changes| {
            state.table(table)?;
            state.check_column_name(table, name, None)?;
            let column = Column {
                id: self.ids.next_field_id(),
                name: name.to_string(),
                table_id: table,
                namespace_id: self.namespace_id,
                position,
                column_type,
                nullable,
                collation,
                default_value: None,
            };
            if let Some(t) = state.tables.get_mut(&table) {
                t.column_ids.push(column.id);
            }
            debug!(
                table_id = table,
                column_id = column.id,
                name = %column.name,
                "column created"
            );
            changes.created(CatalogObject::Column(column.clone()));
            state.columns.insert(column.id, column.clone());
            state.sort_column_ids(table);
            Ok(column)
        })
    }

    /// Swap a column for the copy produced by `change`.
    fn update_column(
        &self,
        operation: &'static str,
        column: ColumnId,
        kind: EventKind,
        change: impl FnOnce(&RelationalState, &Column) -> Result<Column>,
    ) -> Result<Column> {
        self.mutate(operation, |state, changes| {
            let old = state.column(column)?.clone();
            let new = change(state, &old)?;
            debug!(column_id = column, operation, "column updated");
            state.columns.insert(column, new.clone());
            state.sort_column_ids(new.table_id);
            changes.changed(
                kind,
                CatalogObject::Column(old),
                CatalogObject::Column(new.clone()),
            );
            Ok(new)
        })
    }

    /// Rename a column.
    pub fn rename_column(&self, column: ColumnId, name: &str) -> Result<Column> {
        self.update_column("rename_column", column, EventKind::Renamed, |state, old| {
            state.check_column_name(old.table_id, name, Some(column))?;
            Ok(old.with_name(name))
        })
    }

    /// Move a column to another position.
    pub fn set_column_position(&self, column: ColumnId, position: u32) -> Result<Column> {
        self.update_column("set_column_position", column, EventKind::Altered, |_, old| {
            Ok(old.with_position(position))
        })
    }

    /// Change the declared type of a column.
    ///
    /// Fails when scale exceeds length, or when the column takes part in a
    /// foreign key and the new type no longer matches its partner column.
    pub fn set_column_type(&self, column: ColumnId, column_type: ColumnType) -> Result<Column> {
        validate_type(&column_type)?;
        self.update_column("set_column_type", column, EventKind::TypeChanged, |state, old| {
            let new = old.with_type(column_type);
            for fk in state.foreign_keys.values() {
                for (referencing, referenced) in fk.column_pairs() {
                    if referencing == column {
                        let partner = state.column(referenced)?;
                        if !same_type(&new.column_type, &partner.column_type) {
                            return Err(type_mismatch(&new, partner));
                        }
                    } else if referenced == column {
                        let partner = state.column(referencing)?;
                        if !same_type(&partner.column_type, &new.column_type) {
                            return Err(type_mismatch(partner, &new));
                        }
                    }
                }
            }
            Ok(new)
        })
    }

    /// Change nullability. Primary key columns cannot become nullable.
    pub fn set_nullable(&self, column: ColumnId, nullable: bool) -> Result<Column> {
        self.update_column("set_nullable", column, EventKind::Altered, |state, old| {
            if nullable
                && state
                    .primary_key(old.table_id)
                    .is_some_and(|k| k.contains(column))
            {
                return Err(Violation::NullablePrimaryKeyColumn {
                    column: old.name.clone(),
                }
                .into());
            }
            Ok(old.with_nullable(nullable))
        })
    }

    /// Set or clear the collation of a column.
    pub fn set_collation(&self, column: ColumnId, collation: Option<Collation>) -> Result<Column> {
        self.update_column("set_collation", column, EventKind::Altered, |_, old| {
            Ok(old.with_collation(collation))
        })
    }

    /// Set the default value of a column.
    pub fn set_default_value(
        &self,
        column: ColumnId,
        default_value: DefaultValue,
    ) -> Result<Column> {
        self.update_column("set_default_value", column, EventKind::Altered, |_, old| {
            Ok(old.with_default(Some(default_value)))
        })
    }

    /// Remove the default value of a column.
    pub fn delete_default_value(&self, column: ColumnId) -> Result<Column> {
        self.update_column("delete_default_value", column, EventKind::Altered, |_, old| {
            Ok(old.with_default(None))
        })
    }

    /// Drop a column. Fails while the column is part of a key.
    pub fn delete_column(&self, column: ColumnId) -> Result<()> {
        self.mutate("delete_column", |state, changes| {
            let removed = state.column(column)?.clone();
            if let Some(key) = state
                .table_keys(removed.table_id)
                .into_iter()
                .find(|k| k.contains(column))
            {
                return Err(Violation::ColumnInUse {
                    column: removed.name.clone(),
                    key: key.id,
                }
                .into());
            }
            if let Some(t) = state.tables.get_mut(&removed.table_id) {
                t.column_ids.retain(|c| *c != column);
            }
            state.columns.remove(&column);
            debug!(table_id = removed.table_id, column_id = column, "column dropped");
            changes.dropped(CatalogObject::Column(removed));
            Ok(())
        })
    }

    // ----- keys -----

    /// Point a table at a primary key, or clear it.
    fn set_primary_key(state: &mut RelationalState, table: TableId, key: Option<KeyId>) {
        if let Some(t) = state.tables.get_mut(&table) {
            t.primary_key = key;
        }
    }

    /// Install the primary key of a table.
    ///
    /// A primary key over a different column set replaces the current one,
    /// whose key is pruned when nothing else uses it. Re-declaring the
    /// current column set returns the existing key.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn add_primary_key(&self, table: TableId, columns: &[ColumnId]) -> Result<PrimaryKey> {
        self.mutate("add_primary_key", |state, changes| {
            let old_table = state.table(table)?.clone();
            ensure_accepts_constraints(&old_table)?;
            state.validate_columns(table, columns)?;
            for &column in columns {
                let column = state.column(column)?;
                if column.nullable {
                    return Err(Violation::NullablePrimaryKeyColumn {
                        column: column.name.clone(),
                    }
                    .into());
                }
            }
            if let Some(current) = old_table.primary_key {
                if let Some(key) = state.keys.get(&current).filter(|k| k.covers(columns)) {
                    return Ok(PrimaryKey(key.clone()));
                }
                if state.is_foreign_key(current) && state.key_unique_count(current) == 1 {
                    return Err(Violation::KeyRequiredByForeignKey { key: current }.into());
                }
            }

            if let Some(current) = old_table.primary_key {
                Self::set_primary_key(state, table, None);
                state.delete_key_if_no_longer_used(current, changes);
            }
            let key_id =
                state.get_or_add_key(table, columns, EnforcementTime::OnQuery, &self.ids, changes);
            Self::set_primary_key(state, table, Some(key_id));

            let new_table = state.table(table)?.clone();
            changes.changed(
                EventKind::Altered,
                CatalogObject::Table(old_table),
                CatalogObject::Table(new_table),
            );
            debug!(table_id = table, key_id, "primary key installed");
            Ok(PrimaryKey(state.key(key_id)?.clone()))
        })
    }

    /// Add a UNIQUE constraint over `columns`.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn add_unique_constraint(
        &self,
        table: TableId,
        name: &str,
        columns: &[ColumnId],
    ) -> Result<Constraint> {
        self.mutate("add_unique_constraint", |state, changes| {
            ensure_accepts_constraints(state.table(table)?)?;
            state.validate_columns(table, columns)?;
            state.check_key_name(table, ObjectKind::Constraint, name)?;
            if let Some(key) = state.find_key(table, columns) {
                if state
                    .constraints
                    .values()
                    .any(|c| c.key_id == key.id && c.is_unique())
                {
                    return Err(Violation::DuplicateUniqueConstraint { key: key.id }.into());
                }
            }

            let key_id =
                state.get_or_add_key(table, columns, EnforcementTime::OnQuery, &self.ids, changes);
            let constraint = Constraint::unique(self.ids.next_constraint_id(), key_id, table, name);
            debug!(
                table_id = table,
                constraint_id = constraint.id,
                key_id,
                "unique constraint created"
            );
            changes.created(CatalogObject::Constraint(constraint.clone()));
            state.constraints.insert(constraint.id, constraint.clone());
            Ok(constraint)
        })
    }

    /// Add a foreign key from `table` to `def.referenced_table_id`.
    ///
    /// The referenced columns must form a uniquely enforced key of the
    /// referenced table, and each referencing column must have the type of
    /// the referenced column at the same position.
    #[instrument(skip(self, def), fields(namespace_id = self.namespace_id, name = %def.name))]
    pub fn add_foreign_key(&self, table: TableId, def: ForeignKeyDef) -> Result<ForeignKey> {
        self.mutate("add_foreign_key", |state, changes| {
            let referenced_table = def.referenced_table_id;
            if table == referenced_table {
                return Err(Violation::SelfReferencingForeignKey { table }.into());
            }
            ensure_accepts_constraints(state.table(table)?)?;
            ensure_accepts_constraints(state.table(referenced_table)?)?;
            state.validate_columns(table, &def.column_ids)?;
            state.validate_columns(referenced_table, &def.referenced_column_ids)?;
            if def.column_ids.len() != def.referenced_column_ids.len() {
                return Err(Violation::ColumnCountMismatch {
                    referencing: def.column_ids.len(),
                    referenced: def.referenced_column_ids.len(),
                }
                .into());
            }
            state.check_key_name(table, ObjectKind::ForeignKey, &def.name)?;

            let referenced_key = state
                .table_keys(referenced_table)
                .into_iter()
                .find(|k| {
                    k.covers(&def.referenced_column_ids) && state.key_unique_count(k.id) > 0
                })
                .map(|k| k.id)
                .ok_or(Violation::ReferencedColumnsNotUnique {
                    table: referenced_table,
                })?;

            for (&referencing, &referenced) in
                def.column_ids.iter().zip(def.referenced_column_ids.iter())
            {
                let referencing = state.column(referencing)?;
                let referenced = state.column(referenced)?;
                if !same_type(&referencing.column_type, &referenced.column_type) {
                    return Err(type_mismatch(referencing, referenced));
                }
            }

            if let Some(existing) = state.find_key(table, &def.column_ids) {
                if state.foreign_keys.contains_key(&existing.id) {
                    return Err(Violation::DuplicateForeignKey { key: existing.id }.into());
                }
            }

            let key_id = state.get_or_add_key(
                table,
                &def.column_ids,
                EnforcementTime::OnCommit,
                &self.ids,
                changes,
            );
            let foreign_key = ForeignKey {
                id: key_id,
                name: def.name,
                table_id: table,
                namespace_id: self.namespace_id,
                column_ids: def.column_ids,
                referenced_key_id: referenced_key,
                referenced_table_id: referenced_table,
                referenced_namespace_id: self.namespace_id,
                referenced_column_ids: def.referenced_column_ids,
                on_update: def.on_update,
                on_delete: def.on_delete,
            };
            debug!(table_id = table, key_id, referenced_key, "foreign key created");
            changes.created(CatalogObject::ForeignKey(foreign_key.clone()));
            state.foreign_keys.insert(key_id, foreign_key.clone());
            Ok(foreign_key)
        })
    }

    /// Add an index over `def.column_ids`.
    ///
    /// A unique index counts as a uniqueness guarantee of its key. Existing
    /// data is not checked for duplicates.
    #[instrument(skip(self, def), fields(namespace_id = self.namespace_id, name = %def.name))]
    pub fn add_index(&self, table: TableId, def: IndexDef) -> Result<Index> {
        self.mutate("add_index", |state, changes| {
            let target = state.table(table)?;
            if target.kind == EntityKind::View {
                return Err(Error::UnsupportedState(format!(
                    "view '{}' cannot be indexed",
                    target.name
                )));
            }
            state.validate_columns(table, &def.column_ids)?;
            state.check_key_name(table, ObjectKind::Index, &def.name)?;

            let key_id = state.get_or_add_key(
                table,
                &def.column_ids,
                EnforcementTime::OnQuery,
                &self.ids,
                changes,
            );
            let index = Index {
                id: self.ids.next_index_id(),
                name: def.name,
                key_id,
                table_id: table,
                unique: def.unique,
                method: def.method,
                method_display_name: def.method_display_name,
                index_type: def.index_type,
                adapter_id: def.adapter_id,
                physical_name: None,
            };
            debug!(
                table_id = table,
                index_id = index.id,
                key_id,
                unique = index.unique,
                "index created"
            );
            changes.created(CatalogObject::Index(index.clone()));
            state.indexes.insert(index.id, index.clone());
            Ok(index)
        })
    }

    /// Record the name of the physical index.
    pub fn set_index_physical_name(&self, index: IndexId, physical_name: &str) -> Result<Index> {
        self.mutate("set_index_physical_name", |state, changes| {
            let old = state.index(index)?.clone();
            let new = old.with_physical_name(physical_name);
            state.indexes.insert(index, new.clone());
            changes.changed(
                EventKind::Altered,
                CatalogObject::Index(old),
                CatalogObject::Index(new.clone()),
            );
            Ok(new)
        })
    }

    /// Remove the primary key of a table. A table without one is left alone.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn delete_primary_key(&self, table: TableId) -> Result<()> {
        self.mutate("delete_primary_key", |state, changes| {
            let old_table = state.table(table)?.clone();
            let Some(key) = old_table.primary_key else {
                return Ok(());
            };
            state.check_unique_removal(key)?;

            Self::set_primary_key(state, table, None);
            let new_table = state.table(table)?.clone();
            changes.changed(
                EventKind::Altered,
                CatalogObject::Table(old_table),
                CatalogObject::Table(new_table),
            );
            state.delete_key_if_no_longer_used(key, changes);
            debug!(table_id = table, key_id = key, "primary key removed");
            Ok(())
        })
    }

    /// Remove a foreign key.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn delete_foreign_key(&self, foreign_key: KeyId) -> Result<()> {
        self.mutate("delete_foreign_key", |state, changes| {
            let removed = state
                .foreign_keys
                .remove(&foreign_key)
                .ok_or_else(|| Error::not_found(ObjectKind::ForeignKey, foreign_key))?;
            debug!(table_id = removed.table_id, key_id = foreign_key, "foreign key removed");
            changes.dropped(CatalogObject::ForeignKey(removed));
            state.delete_key_if_no_longer_used(foreign_key, changes);
            Ok(())
        })
    }

    /// Remove a constraint.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn delete_constraint(&self, constraint: ConstraintId) -> Result<()> {
        self.mutate("delete_constraint", |state, changes| {
            let existing = state.constraint(constraint)?;
            let key = existing.key_id;
            if existing.is_unique() {
                state.check_unique_removal(key)?;
            }
            if let Some(removed) = state.constraints.remove(&constraint) {
                debug!(
                    table_id = removed.table_id,
                    constraint_id = constraint,
                    "constraint removed"
                );
                changes.dropped(CatalogObject::Constraint(removed));
            }
            state.delete_key_if_no_longer_used(key, changes);
            Ok(())
        })
    }

    /// Remove an index.
    #[instrument(skip(self), fields(namespace_id = self.namespace_id))]
    pub fn delete_index(&self, index: IndexId) -> Result<()> {
        self.mutate("delete_index", |state, changes| {
            let existing = state.index(index)?;
            let key = existing.key_id;
            if existing.unique {
                state.check_unique_removal(key)?;
            }
            if let Some(removed) = state.indexes.remove(&index) {
                debug!(table_id = removed.table_id, index_id = index, "index removed");
                changes.dropped(CatalogObject::Index(removed));
            }
            state.delete_key_if_no_longer_used(key, changes);
            Ok(())
        })
    }

    // ----- read access -----

    /// The namespace record.
    pub fn namespace(&self) -> Namespace {
        self.read(|s| s.namespace().clone())
    }

    /// Get a table, view or materialized view.
    pub fn table(&self, id: TableId) -> Result<Table> {
        self.read(|s| s.table(id).cloned())
    }

    /// Get a table by name.
    pub fn table_by_name(&self, name: &str) -> Result<Table> {
        self.read(|s| s.table_by_name(name).cloned())
    }

    /// All tables ordered by id.
    pub fn tables(&self) -> Vec<Table> {
        self.read(|s| s.tables().into_iter().cloned().collect())
    }

    /// Get a column.
    pub fn column(&self, id: ColumnId) -> Result<Column> {
        self.read(|s| s.column(id).cloned())
    }

    /// Get a column of a table by name.
    pub fn column_by_name(&self, table: TableId, name: &str) -> Result<Column> {
        self.read(|s| s.column_by_name(table, name).cloned())
    }

    /// Columns of a table ordered by position.
    pub fn columns(&self, table: TableId) -> Vec<Column> {
        self.read(|s| s.columns(table).into_iter().cloned().collect())
    }

    /// Get a key.
    pub fn key(&self, id: KeyId) -> Result<Key> {
        self.read(|s| s.key(id).cloned())
    }

    /// All keys.
    pub fn keys(&self) -> Vec<Key> {
        self.read(|s| s.keys().into_iter().cloned().collect())
    }

    /// Keys of a table.
    pub fn table_keys(&self, table: TableId) -> Vec<Key> {
        self.read(|s| s.table_keys(table).into_iter().cloned().collect())
    }

    /// The primary key of a table.
    pub fn primary_key(&self, table: TableId) -> Option<PrimaryKey> {
        self.read(|s| s.primary_key(table).cloned().map(PrimaryKey))
    }

    /// Get a foreign key.
    pub fn foreign_key(&self, id: KeyId) -> Result<ForeignKey> {
        self.read(|s| s.foreign_key(id).cloned())
    }

    /// Foreign keys declared on a table.
    pub fn foreign_keys(&self, table: TableId) -> Vec<ForeignKey> {
        self.read(|s| s.foreign_keys(table).into_iter().cloned().collect())
    }

    /// Foreign keys of other tables referencing a table.
    pub fn exported_keys(&self, table: TableId) -> Vec<ForeignKey> {
        self.read(|s| s.exported_keys(table).into_iter().cloned().collect())
    }

    /// Get a foreign key of a table by name.
    pub fn foreign_key_by_name(&self, table: TableId, name: &str) -> Result<ForeignKey> {
        self.read(|s| s.foreign_key_by_name(table, name).cloned())
    }

    /// Get a constraint.
    pub fn constraint(&self, id: ConstraintId) -> Result<Constraint> {
        self.read(|s| s.constraint(id).cloned())
    }

    /// Constraints of a table.
    pub fn constraints(&self, table: TableId) -> Vec<Constraint> {
        self.read(|s| s.constraints(table).into_iter().cloned().collect())
    }

    /// Get a constraint of a table by name.
    pub fn constraint_by_name(&self, table: TableId, name: &str) -> Result<Constraint> {
        self.read(|s| s.constraint_by_name(table, name).cloned())
    }

    /// Get an index.
    pub fn index(&self, id: IndexId) -> Result<Index> {
        self.read(|s| s.index(id).cloned())
    }

    /// Indexes of a table.
    pub fn indexes(&self, table: TableId, only_unique: bool) -> Vec<Index> {
        self.read(|s| s.indexes(table, only_unique).into_iter().cloned().collect())
    }

    /// Get an index of a table by name.
    pub fn index_by_name(&self, table: TableId, name: &str) -> Result<Index> {
        self.read(|s| s.index_by_name(table, name).cloned())
    }

    /// Check if a key is a primary key.
    pub fn is_primary_key(&self, key: KeyId) -> bool {
        self.read(|s| s.is_primary_key(key))
    }

    /// Check if a key is referenced by a foreign key.
    pub fn is_foreign_key(&self, key: KeyId) -> bool {
        self.read(|s| s.is_foreign_key(key))
    }

    /// Check if an index uses a key.
    pub fn is_index(&self, key: KeyId) -> bool {
        self.read(|s| s.is_index(key))
    }

    /// Check if a constraint uses a key.
    pub fn is_constraint(&self, key: KeyId) -> bool {
        self.read(|s| s.is_constraint(key))
    }

    /// Number of uniqueness guarantees of a key.
    pub fn key_unique_count(&self, key: KeyId) -> usize {
        self.read(|s| s.key_unique_count(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DataType, MaterializedCriteria, NamespaceKind, QueryLanguage};
    use crate::event::{CatalogEvent, MemoryListener};

    fn catalog() -> RelationalCatalog {
        RelationalCatalog::new(
            Namespace::new(0, "public", NamespaceKind::Relational, false),
            Arc::new(IdBuilder::unified()),
            &CatalogConfig::default(),
        )
    }

    fn table_with_columns(
        catalog: &RelationalCatalog,
        name: &str,
        columns: &[&str],
    ) -> (Table, Vec<ColumnId>) {
        let table = catalog.add_table(name, EntityKind::Entity, true).unwrap();
        let ids = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                catalog
                    .add_column(table.id, c, i as u32 + 1, DataType::Integer.into(), false, None)
                    .unwrap()
                    .id
            })
            .collect();
        (table, ids)
    }

    #[test]
    fn test_add_table_rejects_duplicate_name() {
        let catalog = catalog();
        catalog.add_table("orders", EntityKind::Entity, true).unwrap();
        let err = catalog
            .add_table("ORDERS", EntityKind::Entity, true)
            .unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::DuplicateName { kind: ObjectKind::Table, .. })
        ));
    }

    #[test]
    fn test_add_table_rejects_view_kind() {
        let catalog = catalog();
        let err = catalog.add_table("v", EntityKind::View, false).unwrap_err();
        assert!(matches!(err, Error::UnsupportedState(_)));
    }

    #[test]
    fn test_add_column_rejects_invalid_scale() {
        let catalog = catalog();
        let table = catalog.add_table("t", EntityKind::Entity, true).unwrap();
        let err = catalog
            .add_column(table.id, "price", 1, ColumnType::decimal(2, 5), true, None)
            .unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&Violation::InvalidScale { scale: 5, length: 2 })
        );
    }

    #[test]
    fn test_column_updates_are_copies() {
        let catalog = catalog();
        let (_, cols) = table_with_columns(&catalog, "t", &["a"]);
        let before = catalog.column(cols[0]).unwrap();

        let after = catalog.rename_column(cols[0], "b").unwrap();
        assert_eq!(before.name, "a");
        assert_eq!(after.name, "b");

        let after = catalog.set_column_position(cols[0], 4).unwrap();
        assert_eq!(after.position, 4);
        let after = catalog
            .set_collation(cols[0], Some(Collation::CaseSensitive))
            .unwrap();
        assert_eq!(after.collation, Some(Collation::CaseSensitive));
        let after = catalog
            .set_default_value(cols[0], DefaultValue::literal(DataType::Integer, "0"))
            .unwrap();
        assert!(after.has_default());
        let after = catalog.delete_default_value(cols[0]).unwrap();
        assert!(!after.has_default());
    }

    #[test]
    fn test_primary_key_rejects_nullable_column() {
        let catalog = catalog();
        let table = catalog.add_table("t", EntityKind::Entity, true).unwrap();
        let col = catalog
            .add_column(table.id, "email", 1, ColumnType::varchar(64), true, None)
            .unwrap();

        let err = catalog.add_primary_key(table.id, &[col.id]).unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&Violation::NullablePrimaryKeyColumn {
                column: "email".into()
            })
        );
        assert!(catalog.keys().is_empty());
    }

    #[test]
    fn test_primary_key_column_cannot_become_nullable() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["id"]);
        catalog.add_primary_key(table.id, &cols).unwrap();

        let err = catalog.set_nullable(cols[0], true).unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::NullablePrimaryKeyColumn { .. })
        ));
        assert!(!catalog.column(cols[0]).unwrap().nullable);
    }

    #[test]
    fn test_readding_same_primary_key_is_noop() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["a", "b"]);
        let first = catalog.add_primary_key(table.id, &cols).unwrap();

        let listener = MemoryListener::new();
        catalog.subscribe(Arc::new(listener.clone()));
        let second = catalog.add_primary_key(table.id, &[cols[1], cols[0]]).unwrap();

        assert_eq!(first, second);
        assert!(listener.is_empty());
    }

    #[test]
    fn test_replacing_primary_key_prunes_old_key() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["a", "b"]);
        let old = catalog.add_primary_key(table.id, &[cols[0]]).unwrap();
        let new = catalog.add_primary_key(table.id, &[cols[1]]).unwrap();

        assert_ne!(old.id, new.id);
        assert!(catalog.key(old.id).unwrap_err().is_not_found());
        assert_eq!(catalog.table(table.id).unwrap().primary_key, Some(new.id));
    }

    #[test]
    fn test_keys_rejected_on_views() {
        let catalog = catalog();
        let view = catalog
            .add_view("v", false, ViewDefinition::new("SELECT 1", QueryLanguage::Sql))
            .unwrap();
        catalog
            .add_column(view.id, "x", 1, DataType::Integer.into(), false, None)
            .unwrap();
        let col = catalog.columns(view.id)[0].id;

        let err = catalog.add_primary_key(view.id, &[col]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedState(_)));
        let err = catalog.add_index(view.id, IndexDef::new("idx", vec![col])).unwrap_err();
        assert!(matches!(err, Error::UnsupportedState(_)));
    }

    #[test]
    fn test_materialized_view_refresh() {
        let catalog = catalog();
        let definition = ViewDefinition::new("SELECT 1", QueryLanguage::Sql)
            .materialized(MaterializedCriteria::manual(), false);
        let view = catalog.add_materialized_view("mv", definition).unwrap();
        assert_eq!(view.materialized_criteria().unwrap().last_refresh, None);

        let refreshed = catalog.update_materialized_view_refresh_time(view.id).unwrap();
        assert!(refreshed.materialized_criteria().unwrap().last_refresh.is_some());

        let table = catalog.add_table("t", EntityKind::Entity, true).unwrap();
        let err = catalog
            .update_materialized_view_refresh_time(table.id)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedState(_)));
    }

    #[test]
    fn test_materialized_view_needs_criteria() {
        let catalog = catalog();
        let err = catalog
            .add_materialized_view("mv", ViewDefinition::new("SELECT 1", QueryLanguage::Sql))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedState(_)));
    }

    #[test]
    fn test_delete_column_in_key_fails() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["a", "b"]);
        catalog.add_primary_key(table.id, &[cols[0]]).unwrap();

        let err = catalog.delete_column(cols[0]).unwrap_err();
        assert!(matches!(err.violation(), Some(Violation::ColumnInUse { .. })));

        catalog.delete_column(cols[1]).unwrap();
        assert_eq!(catalog.table(table.id).unwrap().column_ids, vec![cols[0]]);
    }

    #[test]
    fn test_column_ids_follow_positions() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["a", "b", "c"]);
        assert_eq!(catalog.table(table.id).unwrap().column_ids, cols);

        catalog.set_column_position(cols[0], 10).unwrap();
        assert_eq!(
            catalog.table(table.id).unwrap().column_ids,
            vec![cols[1], cols[2], cols[0]]
        );

        let d = catalog
            .add_column(table.id, "d", 0, DataType::Integer.into(), true, None)
            .unwrap();
        let ordered: Vec<_> = catalog.columns(table.id).iter().map(|c| c.id).collect();
        assert_eq!(catalog.table(table.id).unwrap().column_ids, ordered);
        assert_eq!(ordered[0], d.id);
    }

    #[test]
    fn test_concurrent_events_follow_mutation_order() {
        let catalog = catalog();
        let listener = MemoryListener::new();
        catalog.subscribe(Arc::new(listener.clone()));

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let catalog = &catalog;
                scope.spawn(move || {
                    for i in 0..100 {
                        catalog
                            .add_table(&format!("t_{writer}_{i}"), EntityKind::Entity, true)
                            .unwrap();
                    }
                });
            }
        });

        let ids: Vec<u64> = listener.events().iter().filter_map(|e| e.object_id()).collect();
        assert_eq!(ids.len(), 800);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_listener_may_mutate_its_catalog() {
        let catalog = Arc::new(catalog());
        let inner = Arc::downgrade(&catalog);
        catalog.subscribe(Arc::new(move |event: &CatalogEvent| {
            let created_table = event.kind == EventKind::Created
                && event.object_kind() == Some(ObjectKind::Table);
            if let (true, Some(catalog)) = (created_table, inner.upgrade()) {
                if let Some(id) = event.object_id() {
                    catalog
                        .add_column(id, "id", 0, DataType::BigInt.into(), false, None)
                        .unwrap();
                }
            }
        }));

        let table = catalog.add_table("t", EntityKind::Entity, true).unwrap();
        assert_eq!(catalog.columns(table.id).len(), 1);
    }

    #[test]
    fn test_flag_table_for_deletion() {
        let catalog = catalog();
        let table = catalog.add_table("t", EntityKind::Entity, true).unwrap();

        catalog.flag_table_for_deletion(table.id, true).unwrap();
        assert!(catalog.is_table_flagged_for_deletion(table.id));
        catalog.flag_table_for_deletion(table.id, false).unwrap();
        assert!(!catalog.is_table_flagged_for_deletion(table.id));

        catalog.flag_table_for_deletion(table.id, true).unwrap();
        catalog.delete_table(table.id).unwrap();
        assert!(!catalog.is_table_flagged_for_deletion(table.id));
        assert!(catalog.flag_table_for_deletion(99, true).is_err());
    }

    #[test]
    fn test_index_physical_name() {
        let catalog = catalog();
        let (table, cols) = table_with_columns(&catalog, "t", &["a"]);
        let index = catalog
            .add_index(table.id, IndexDef::new("idx_a", cols.clone()))
            .unwrap();

        let placed = catalog.set_index_physical_name(index.id, "idx_a_1").unwrap();
        assert_eq!(placed.physical_name.as_deref(), Some("idx_a_1"));
        assert_eq!(catalog.index_by_name(table.id, "IDX_A").unwrap().id, index.id);

        let err = catalog
            .add_index(table.id, IndexDef::new("idx_a", cols))
            .unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::DuplicateName { kind: ObjectKind::Index, .. })
        ));
    }

    #[test]
    fn test_copy_is_independent() {
        let catalog = catalog();
        let (table, _) = table_with_columns(&catalog, "t", &["a"]);
        let copy = catalog.copy().unwrap();

        catalog.rename_table(table.id, "renamed").unwrap();
        assert_eq!(copy.table(table.id).unwrap().name, "t");
        assert_eq!(copy.export().columns, catalog.export().columns);
    }
}
