//! Catalog value types.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by a catalog source.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("table not found in catalog: {0}")]
    TableNotFound(String),

    #[error("catalog source failed: {0}")]
    Source(String),

    #[error("failed to parse catalog definition: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A physical table as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,

    #[serde(default)]
    pub schema: Option<String>,

    /// Row count from catalog statistics, when known without a scan.
    #[serde(default)]
    pub row_count: Option<u64>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            row_count: None,
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    /// `schema.name`, or just the name when no schema is known.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

/// A physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// The role a physical table was given by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableUsage {
    Fact,
    Aggregate,
}

impl fmt::Display for TableUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableUsage::Fact => f.write_str("FACT"),
            TableUsage::Aggregate => f.write_str("AGGREGATE"),
        }
    }
}
