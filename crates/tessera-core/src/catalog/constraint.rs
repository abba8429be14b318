//! Constraint definitions for tables.

use rkyv::{Archive, Deserialize, Serialize};

use super::types::ConstraintKind;
use crate::ids::{ConstraintId, KeyId, TableId};

/// A named rule bound to a key.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint id.
    pub id: ConstraintId,
    /// The key the constraint enforces.
    pub key_id: KeyId,
    /// Table owning the key.
    pub table_id: TableId,
    /// Constraint kind.
    pub kind: ConstraintKind,
    /// Constraint name.
    pub name: String,
}

impl Constraint {
    /// Create a unique constraint.
    pub fn unique(
        id: ConstraintId,
        key_id: KeyId,
        table_id: TableId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            key_id,
            table_id,
            kind: ConstraintKind::Unique,
            name: name.into(),
        }
    }

    /// Check if this is a unique constraint.
    pub fn is_unique(&self) -> bool {
        self.kind == ConstraintKind::Unique
    }
}
