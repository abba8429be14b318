//! Column definitions for tables.

use rkyv::{Archive, Deserialize, Serialize};

use super::types::{Collation, ColumnType, DataType};
use crate::ids::{ColumnId, NamespaceId, TableId};

/// Default value of a column.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct DefaultValue {
    /// Type the value literal is expressed in.
    pub data_type: DataType,
    /// The literal, as written in the statement.
    pub value: String,
    /// Generator function name, if the default is computed.
    pub function: Option<String>,
}

impl DefaultValue {
    /// A literal default.
    pub fn literal(data_type: DataType, value: impl Into<String>) -> Self {
        Self {
            data_type,
            value: value.into(),
            function: None,
        }
    }

    /// A default computed by a function.
    pub fn function(data_type: DataType, function: impl Into<String>) -> Self {
        Self {
            data_type,
            value: String::new(),
            function: Some(function.into()),
        }
    }
}

/// A column of a table.
///
/// Columns are immutable values: every change produces a new column through
/// one of the `with_*` methods, and the catalog swaps the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Column {
    /// Column id.
    pub id: ColumnId,
    /// Column name (unique within its table).
    pub name: String,
    /// Owning table.
    pub table_id: TableId,
    /// Owning namespace.
    pub namespace_id: NamespaceId,
    /// Ordinal position, starting at 1.
    pub position: u32,
    /// Declared type.
    pub column_type: ColumnType,
    /// Whether the column accepts nulls.
    pub nullable: bool,
    /// Collation for character columns.
    pub collation: Option<Collation>,
    /// Default value.
    pub default_value: Option<DefaultValue>,
}

impl Column {
    /// Copy with a new name.
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy with a new position.
    pub fn with_position(&self, position: u32) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    /// Copy with a new declared type.
    pub fn with_type(&self, column_type: ColumnType) -> Self {
        Self {
            column_type,
            ..self.clone()
        }
    }

    /// Copy with a new nullability.
    pub fn with_nullable(&self, nullable: bool) -> Self {
        Self {
            nullable,
            ..self.clone()
        }
    }

    /// Copy with a new collation.
    pub fn with_collation(&self, collation: Option<Collation>) -> Self {
        Self {
            collation,
            ..self.clone()
        }
    }

    /// Copy with a new default value.
    pub fn with_default(&self, default_value: Option<DefaultValue>) -> Self {
        Self {
            default_value,
            ..self.clone()
        }
    }

    /// The base data type.
    pub fn data_type(&self) -> DataType {
        self.column_type.base
    }

    /// Check if this column has a default value.
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}
