//! # aggnav
//!
//! Aggregate table navigation for star schemas.
//!
//! ## Architecture
//!
//! Given a logical schema and a physical catalog, the navigator finds the
//! tables that are pre-computed roll-ups of each star's fact table and
//! registers them on the star, cheapest first:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          StarSchema (stars, cubes, explicit rules)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [catalog snapshot]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Fact binding (measures, keys per column)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [rules: explicit, then default]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Candidate binding + cost (must be positive)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [commit]
//! ┌─────────────────────────────────────────────────────────┐
//! │          LogicalStar::aggregates (swapped whole)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Problems found along the way go to a [`recorder::MessageRecorder`];
//! too many errors abort the star, and any error fails the run.

pub mod binder;
pub mod candidate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod navigator;
pub mod recorder;
pub mod rules;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::binder::{BindingResult, ColumnBinding, ColumnUsage, JoinTarget};
    pub use crate::candidate::{AggregateCandidate, RuleSource};
    pub use crate::catalog::{CatalogSource, ColumnInfo, InMemoryCatalog, TableInfo};
    pub use crate::config::Settings;
    pub use crate::error::{AggError, AggResult};
    pub use crate::model::{Aggregator, Cube, LogicalStar, StarSchema};
    pub use crate::navigator::{AggTableManager, DiscoveryReport, DiscoveryState, StarReport};
    pub use crate::recorder::{Message, MessageRecorder, Severity};
    pub use crate::rules::{ColumnOverride, ExplicitRuleGroup, IncludeRule, TableMatcher};
}

pub use error::{AggError, AggResult};
pub use navigator::AggTableManager;
