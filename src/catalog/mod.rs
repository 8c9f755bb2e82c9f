//! Physical catalog snapshot.
//!
//! The catalog is consumed through the [`CatalogSource`] trait. A
//! [`CatalogSnapshot`] lists table names eagerly and loads each table's
//! columns on first access, caching them for the rest of the run.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                CatalogSnapshot                │
//! │  tables()          (eager, from list_tables)  │
//! │  columns(table)    (lazy, memoized per table) │
//! │  mark_usage(..)    (FACT / AGGREGATE)         │
//! └───────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │         CatalogSource (live connection,       │
//! │         InMemoryCatalog for fixtures)         │
//! └───────────────────────────────────────────────┘
//! ```

mod snapshot;
mod source;
mod types;

pub use snapshot::{CatalogSnapshot, CatalogTable};
pub use source::{CatalogSource, InMemoryCatalog, TableDefinition};
pub use types::{CatalogError, CatalogResult, ColumnInfo, TableInfo, TableUsage};
