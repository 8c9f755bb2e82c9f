//! CatalogSource trait and the in-memory implementation.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;

use super::types::{CatalogError, CatalogResult, ColumnInfo, TableInfo};

/// Access to a physical relational catalog.
///
/// Implementations may perform network I/O; the navigator does not bound
/// their latency.
pub trait CatalogSource: Send + Sync {
    /// List every table visible to the connection, in catalog order.
    fn list_tables(&self) -> CatalogResult<Vec<TableInfo>>;

    /// Load the ordered column list of one table.
    fn load_columns(&self, table: &TableInfo) -> CatalogResult<Vec<ColumnInfo>>;
}

/// A table together with its columns, as stored by [`InMemoryCatalog`].
#[derive(Debug, Clone, Deserialize)]
pub struct TableDefinition {
    #[serde(flatten)]
    pub info: TableInfo,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// A catalog held in memory, used for fixtures and offline discovery.
///
/// Counts column loads so callers can observe the lazy-loading contract.
///
/// ```
/// use aggnav::catalog::{CatalogSource, InMemoryCatalog};
///
/// let catalog = InMemoryCatalog::from_json(r#"[
///     { "name": "sales_fact", "columns": [{ "name": "unit_sales", "data_type": "decimal" }] }
/// ]"#).unwrap();
/// assert_eq!(catalog.list_tables().unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: Vec<TableDefinition>,
    column_loads: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON array of table definitions.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        let tables: Vec<TableDefinition> = serde_json::from_str(json)?;
        Ok(Self {
            tables,
            column_loads: AtomicUsize::new(0),
        })
    }

    /// Add a table with columns given as `(name, data_type)` pairs.
    pub fn with_table(mut self, info: TableInfo, columns: &[(&str, &str)]) -> Self {
        self.add_table(info, columns);
        self
    }

    pub fn add_table(&mut self, info: TableInfo, columns: &[(&str, &str)]) {
        self.tables.push(TableDefinition {
            info,
            columns: columns
                .iter()
                .map(|(name, data_type)| ColumnInfo::new(*name, *data_type))
                .collect(),
        });
    }

    /// Remove a table by exact name. Returns whether it existed.
    pub fn remove_table(&mut self, name: &str) -> bool {
        let before = self.tables.len();
        self.tables.retain(|t| t.info.name != name);
        self.tables.len() != before
    }

    /// Number of `load_columns` calls served so far.
    pub fn column_loads(&self) -> usize {
        self.column_loads.load(Ordering::Relaxed)
    }
}

impl CatalogSource for InMemoryCatalog {
    fn list_tables(&self) -> CatalogResult<Vec<TableInfo>> {
        Ok(self.tables.iter().map(|t| t.info.clone()).collect())
    }

    fn load_columns(&self, table: &TableInfo) -> CatalogResult<Vec<ColumnInfo>> {
        self.column_loads.fetch_add(1, Ordering::Relaxed);
        self.tables
            .iter()
            .find(|t| t.info.name == table.name && t.info.schema == table.schema)
            .map(|t| t.columns.clone())
            .ok_or_else(|| CatalogError::TableNotFound(table.qualified_name()))
    }
}
