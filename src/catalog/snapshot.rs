//! CatalogSnapshot: eager table list, lazy memoized columns.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use super::source::CatalogSource;
use super::types::{CatalogResult, ColumnInfo, TableInfo, TableUsage};

/// One table of a snapshot.
///
/// Columns are not fetched until [`CatalogSnapshot::columns`] is first called
/// for this table.
#[derive(Debug)]
pub struct CatalogTable {
    info: TableInfo,
    columns: OnceCell<Vec<ColumnInfo>>,
}

impl CatalogTable {
    fn new(info: TableInfo) -> Self {
        Self {
            info,
            columns: OnceCell::new(),
        }
    }

    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether the columns have been loaded already.
    pub fn is_loaded(&self) -> bool {
        self.columns.get().is_some()
    }
}

/// A point-in-time view of the physical catalog for one discovery run.
///
/// Reloading discards the snapshot and builds a new one, so physical changes
/// are picked up.
pub struct CatalogSnapshot {
    source: Arc<dyn CatalogSource>,
    tables: Vec<CatalogTable>,
    // lowercase name -> indices into `tables`
    by_name: HashMap<String, Vec<usize>>,
    usage: DashMap<String, TableUsage>,
    // star name -> tables last committed as its aggregates
    aggregates_by_star: DashMap<String, Vec<String>>,
}

impl std::fmt::Debug for CatalogSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSnapshot")
            .field("tables", &self.tables)
            .field("usage", &self.usage)
            .field("aggregates_by_star", &self.aggregates_by_star)
            .finish()
    }
}

impl CatalogSnapshot {
    /// List the source's tables. Columns stay unloaded.
    pub fn load(source: Arc<dyn CatalogSource>) -> CatalogResult<Self> {
        let infos = source.list_tables()?;
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let tables: Vec<CatalogTable> = infos
            .into_iter()
            .enumerate()
            .map(|(idx, info)| {
                by_name.entry(info.name.to_lowercase()).or_default().push(idx);
                CatalogTable::new(info)
            })
            .collect();

        tracing::debug!(tables = tables.len(), "loaded catalog snapshot");

        Ok(Self {
            source,
            tables,
            by_name,
            usage: DashMap::new(),
            aggregates_by_star: DashMap::new(),
        })
    }

    /// Tables in catalog order.
    pub fn tables(&self) -> &[CatalogTable] {
        &self.tables
    }

    /// Find a table by name: exact match first, then case-insensitive.
    pub fn table(&self, name: &str) -> Option<&CatalogTable> {
        let candidates = self.by_name.get(&name.to_lowercase())?;
        candidates
            .iter()
            .map(|&idx| &self.tables[idx])
            .find(|t| t.info.name == name)
            .or_else(|| candidates.first().map(|&idx| &self.tables[idx]))
    }

    /// The table's columns, loading them from the source on first access.
    pub fn columns<'a>(&self, table: &'a CatalogTable) -> CatalogResult<&'a [ColumnInfo]> {
        let columns = table.columns.get_or_try_init(|| {
            tracing::debug!(table = %table.info.qualified_name(), "loading columns");
            self.source.load_columns(&table.info)
        })?;
        Ok(columns.as_slice())
    }

    /// Tag a table with the role discovery gave it.
    pub fn mark_usage(&self, name: &str, usage: TableUsage) {
        self.usage.insert(name.to_string(), usage);
    }

    pub fn usage(&self, name: &str) -> Option<TableUsage> {
        self.usage.get(name).map(|entry| *entry.value())
    }

    /// Record the aggregates a star committed, replacing its previous set.
    ///
    /// Tables the star no longer registers lose their `Aggregate` mark unless
    /// another star still registers them.
    pub fn mark_aggregates(&self, star: &str, tables: &[String]) {
        let previous = self
            .aggregates_by_star
            .insert(star.to_string(), tables.to_vec())
            .unwrap_or_default();

        for name in previous.iter().filter(|name| !tables.contains(name)) {
            let claimed = self
                .aggregates_by_star
                .iter()
                .any(|entry| entry.key().as_str() != star && entry.value().contains(name));
            if !claimed {
                self.usage
                    .remove_if(name, |_, usage| *usage == TableUsage::Aggregate);
            }
        }
        for name in tables {
            self.usage.insert(name.clone(), TableUsage::Aggregate);
        }
    }
}
