//! Catalog configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::IdAllocation;

/// Configuration for a catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// How ids are spread over categories.
    pub id_allocation: IdAllocation,

    /// Drop the keys, constraints, indexes and foreign keys of a table
    /// together with the table. When off, dropping a table only removes the
    /// table and its columns.
    pub cascade_table_drop: bool,

    /// Case sensitivity of namespaces created without an explicit flag.
    pub default_case_sensitive: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            id_allocation: IdAllocation::PerCategory,
            cascade_table_drop: false,
            default_case_sensitive: false,
        }
    }
}

impl CatalogConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Set the id allocation mode.
    pub fn with_id_allocation(mut self, allocation: IdAllocation) -> Self {
        self.id_allocation = allocation;
        self
    }

    /// Enable or disable cascading table drops.
    pub fn with_cascade_table_drop(mut self, cascade: bool) -> Self {
        self.cascade_table_drop = cascade;
        self
    }

    /// Set the default case sensitivity of new namespaces.
    pub fn with_default_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.default_case_sensitive = case_sensitive;
        self
    }
}
