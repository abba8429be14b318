//! Catalog object identifiers and their allocator.
//!
//! Ids are stable for the lifetime of a catalog process and are never reused,
//! not even after the object they named has been dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use rkyv::{Archive, Deserialize, Serialize};

/// Namespace identifier.
pub type NamespaceId = u64;
/// Identifier of a table, view, collection or graph.
pub type EntityId = u64;
/// Table identifier (an entity of a relational namespace).
pub type TableId = EntityId;
/// Column / field identifier.
pub type ColumnId = u64;
/// Key identifier. A foreign key shares the id of its referencing key.
pub type KeyId = u64;
/// Constraint identifier.
pub type ConstraintId = u64;
/// Index identifier.
pub type IndexId = u64;
/// Identifier of the storage adapter an index lives on.
pub type AdapterId = u64;

/// How the builder spreads ids over categories.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IdAllocation {
    /// One sequence per category. Namespaces and entities share the logical sequence.
    #[default]
    PerCategory,
    /// A single sequence for every category.
    Unified,
}

/// Counter positions, exported with a serialized catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct IdWatermarks {
    /// Next namespace/entity id.
    pub logical: u64,
    /// Next field id.
    pub field: u64,
    /// Next key id.
    pub key: u64,
    /// Next index id.
    pub index: u64,
    /// Next constraint id.
    pub constraint: u64,
}

impl IdWatermarks {
    /// Marks for a builder running under `allocation`, given marks taken
    /// while ids were issued under `issued_under`.
    ///
    /// Switching modes moves every counter past the highest mark, since the
    /// other mode may have issued any id below it.
    pub fn reallocate(self, issued_under: IdAllocation, allocation: IdAllocation) -> Self {
        if issued_under == allocation {
            return self;
        }
        let highest = self
            .logical
            .max(self.field)
            .max(self.key)
            .max(self.index)
            .max(self.constraint);
        IdWatermarks {
            logical: highest,
            field: highest,
            key: highest,
            index: highest,
            constraint: highest,
        }
    }
}

const LOGICAL: usize = 0;
const FIELD: usize = 1;
const KEY: usize = 2;
const INDEX: usize = 3;
const CONSTRAINT: usize = 4;

/// Monotonic id allocator shared by every namespace catalog of a process.
#[derive(Debug)]
pub struct IdBuilder {
    allocation: IdAllocation,
    counters: [AtomicU64; 5],
}

impl IdBuilder {
    /// Create a builder whose sequences all start at 1.
    pub fn new(allocation: IdAllocation) -> Self {
        Self::restore(
            allocation,
            IdWatermarks {
                logical: 1,
                field: 1,
                key: 1,
                index: 1,
                constraint: 1,
            },
        )
    }

    /// Create a builder with one sequence per category.
    pub fn per_category() -> Self {
        Self::new(IdAllocation::PerCategory)
    }

    /// Create a builder drawing every id from one sequence.
    pub fn unified() -> Self {
        Self::new(IdAllocation::Unified)
    }

    /// Recreate a builder that continues after previously issued ids.
    pub fn restore(allocation: IdAllocation, marks: IdWatermarks) -> Self {
        Self {
            allocation,
            counters: [
                AtomicU64::new(marks.logical),
                AtomicU64::new(marks.field),
                AtomicU64::new(marks.key),
                AtomicU64::new(marks.index),
                AtomicU64::new(marks.constraint),
            ],
        }
    }

    /// The allocation mode.
    pub fn allocation(&self) -> IdAllocation {
        self.allocation
    }

    /// Current counter positions.
    pub fn watermarks(&self) -> IdWatermarks {
        let load = |slot: usize| self.counters[slot].load(Ordering::SeqCst);
        IdWatermarks {
            logical: load(LOGICAL),
            field: load(FIELD),
            key: load(KEY),
            index: load(INDEX),
            constraint: load(CONSTRAINT),
        }
    }

    fn next(&self, slot: usize) -> u64 {
        let slot = match self.allocation {
            IdAllocation::PerCategory => slot,
            IdAllocation::Unified => LOGICAL,
        };
        self.counters[slot].fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate a namespace id.
    pub fn next_namespace_id(&self) -> NamespaceId {
        self.next(LOGICAL)
    }

    /// Allocate an entity (table, view, collection, graph) id.
    pub fn next_entity_id(&self) -> EntityId {
        self.next(LOGICAL)
    }

    /// Allocate a field (column) id.
    pub fn next_field_id(&self) -> ColumnId {
        self.next(FIELD)
    }

    /// Allocate a key id.
    pub fn next_key_id(&self) -> KeyId {
        self.next(KEY)
    }

    /// Allocate an index id.
    pub fn next_index_id(&self) -> IndexId {
        self.next(INDEX)
    }

    /// Allocate a constraint id.
    pub fn next_constraint_id(&self) -> ConstraintId {
        self.next(CONSTRAINT)
    }
}

impl Default for IdBuilder {
    fn default() -> Self {
        Self::per_category()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_per_category_sequences() {
        let ids = IdBuilder::per_category();
        assert_eq!(ids.next_entity_id(), 1);
        assert_eq!(ids.next_field_id(), 1);
        assert_eq!(ids.next_key_id(), 1);
        assert_eq!(ids.next_key_id(), 2);
        assert_eq!(ids.next_index_id(), 1);
        assert_eq!(ids.next_constraint_id(), 1);
    }

    #[test]
    fn test_namespaces_share_logical_sequence() {
        let ids = IdBuilder::per_category();
        let ns = ids.next_namespace_id();
        let table = ids.next_entity_id();
        assert_ne!(ns, table);
        assert!(table > ns);
    }

    #[test]
    fn test_unified_sequence() {
        let ids = IdBuilder::unified();
        assert_eq!(ids.next_entity_id(), 1);
        assert_eq!(ids.next_field_id(), 2);
        assert_eq!(ids.next_key_id(), 3);
        assert_eq!(ids.next_constraint_id(), 4);
        assert_eq!(ids.next_index_id(), 5);
    }

    #[test]
    fn test_restore_continues_after_watermarks() {
        let ids = IdBuilder::per_category();
        for _ in 0..3 {
            ids.next_key_id();
        }
        let marks = ids.watermarks();
        assert_eq!(marks.key, 4);

        let restored = IdBuilder::restore(IdAllocation::PerCategory, marks);
        assert_eq!(restored.next_key_id(), 4);
        assert_eq!(restored.next_field_id(), 1);
    }

    #[test]
    fn test_reallocate_across_modes() {
        let unified = IdBuilder::unified();
        let issued: Vec<u64> = vec![
            unified.next_entity_id(),
            unified.next_field_id(),
            unified.next_field_id(),
            unified.next_key_id(),
        ];
        let marks = unified
            .watermarks()
            .reallocate(IdAllocation::Unified, IdAllocation::PerCategory);
        let restored = IdBuilder::restore(IdAllocation::PerCategory, marks);
        let fresh = [
            restored.next_entity_id(),
            restored.next_field_id(),
            restored.next_key_id(),
            restored.next_index_id(),
            restored.next_constraint_id(),
        ];
        assert!(fresh.iter().all(|id| !issued.contains(id)));

        let per_category = IdBuilder::per_category();
        for _ in 0..6 {
            per_category.next_key_id();
        }
        per_category.next_entity_id();
        let marks = per_category
            .watermarks()
            .reallocate(IdAllocation::PerCategory, IdAllocation::Unified);
        let restored = IdBuilder::restore(IdAllocation::Unified, marks);
        assert_eq!(restored.next_entity_id(), 7);

        let same = per_category
            .watermarks()
            .reallocate(IdAllocation::PerCategory, IdAllocation::PerCategory);
        assert_eq!(same, per_category.watermarks());
    }

    #[test]
    fn test_concurrent_allocation_never_repeats() {
        let ids = Arc::new(IdBuilder::per_category());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = ids.clone();
            handles.push(std::thread::spawn(move || {
                (0..500).map(|_| ids.next_key_id()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {} issued twice", id);
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
