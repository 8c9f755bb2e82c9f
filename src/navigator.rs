//! Aggregate table navigation.
//!
//! [`AggTableManager`] walks the catalog for every star of a schema and
//! registers the tables that are valid aggregates of the star's fact table.
//!
//! Per star the run moves through these states:
//!
//! ```text
//! Idle ─▶ RuleGroupsGathered ─▶ FactTableBound ─▶ Scanning ─▶ Committed
//!                     │                                 │
//!                     └─▶ Skipped (no fact table)       └─▶ Aborted (too many errors)
//! ```
//!
//! Candidates are checked with explicit rules first and default rules second;
//! the new aggregate list is built privately and swapped onto the star in one
//! step, so concurrent readers never see a partial list.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use aggnav::catalog::{InMemoryCatalog, TableInfo};
//! use aggnav::model::{Aggregator, LogicalStar, StarSchema};
//! use aggnav::navigator::AggTableManager;
//!
//! let catalog = InMemoryCatalog::new()
//!     .with_table(TableInfo::new("sales_fact"), &[("unit_sales", "decimal"), ("product_id", "integer")])
//!     .with_table(TableInfo::new("agg_c_14_sales_fact"), &[("unit_sales", "decimal"), ("product_id", "integer")]);
//! let schema = StarSchema::new().with_star(
//!     LogicalStar::new("sales", "sales_fact")
//!         .with_measure("unit_sales", "unit_sales", Aggregator::Sum)
//!         .with_foreign_key("product_id", "product"),
//! );
//!
//! let mut manager = AggTableManager::new(Arc::new(catalog));
//! manager.discover(&schema).unwrap();
//! assert_eq!(schema.stars()[0].aggregates().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::binder::{bind_fact_table, BindingResult};
use crate::candidate::{AggregateCandidate, CostHint, RuleSource};
use crate::catalog::{CatalogSnapshot, CatalogSource, CatalogTable, TableUsage};
use crate::config::Settings;
use crate::error::{AggError, AggResult};
use crate::model::{LogicalStar, StarSchema};
use crate::recorder::{Message, MessageRecorder, RecorderResult};
use crate::rules::{exclude_table, include_by_table_def, DefaultRules, RuleGroup};

/// Where discovery of one star ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryState {
    Idle,
    RuleGroupsGathered,
    FactTableBound,
    Scanning,
    Committed,
    /// The fact table is not in the catalog; the star was left untouched.
    Skipped,
    Aborted,
}

impl fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryState::Idle => "idle",
            DiscoveryState::RuleGroupsGathered => "rule groups gathered",
            DiscoveryState::FactTableBound => "fact table bound",
            DiscoveryState::Scanning => "scanning",
            DiscoveryState::Committed => "committed",
            DiscoveryState::Skipped => "skipped",
            DiscoveryState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of discovery for one star.
#[derive(Debug, Clone, Serialize)]
pub struct StarReport {
    pub star: String,
    pub state: DiscoveryState,
    /// Registered aggregate tables, cheapest first.
    pub registered: Vec<String>,
    pub info_count: usize,
    pub warning_count: usize,
    pub error_count: usize,
    pub messages: Vec<Message>,
}

impl StarReport {
    fn new(star: &str, state: DiscoveryState, registered: Vec<String>, recorder: &MessageRecorder) -> Self {
        Self {
            star: star.to_string(),
            state,
            registered,
            info_count: recorder.info_count(),
            warning_count: recorder.warning_count(),
            error_count: recorder.error_count(),
            messages: recorder.messages().to_vec(),
        }
    }
}

/// Outcome of discovery over a whole schema.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub stars: Vec<StarReport>,
}

impl DiscoveryReport {
    pub fn star(&self, name: &str) -> Option<&StarReport> {
        self.stars.iter().find(|s| s.star == name)
    }

    pub fn error_count(&self) -> usize {
        self.stars.iter().map(|s| s.error_count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.stars.iter().map(|s| s.warning_count).sum()
    }

    pub fn registered_count(&self) -> usize {
        self.stars.iter().map(|s| s.registered.len()).sum()
    }
}

/// Discovers and registers aggregate tables for every star of a schema.
///
/// Holds the catalog snapshot between runs; [`reload`](Self::reload) drops it
/// so physical changes are seen. Methods take `&mut self`, so runs through one
/// manager never overlap.
pub struct AggTableManager {
    source: Arc<dyn CatalogSource>,
    settings: Settings,
    default_rules: DefaultRules,
    snapshot: Option<Arc<CatalogSnapshot>>,
}

impl AggTableManager {
    /// Manager with default settings.
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            settings: Settings::default(),
            default_rules: DefaultRules::new(),
            snapshot: None,
        }
    }

    /// Manager with validated custom settings.
    pub fn with_settings(source: Arc<dyn CatalogSource>, settings: Settings) -> AggResult<Self> {
        settings.validate()?;
        let default_rules = DefaultRules::from_settings(&settings.default_rules)?;
        Ok(Self {
            source,
            settings,
            default_rules,
            snapshot: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The current catalog snapshot, listing the catalog on first use.
    pub fn snapshot(&mut self) -> AggResult<Arc<CatalogSnapshot>> {
        if let Some(snapshot) = &self.snapshot {
            return Ok(Arc::clone(snapshot));
        }
        let snapshot = Arc::new(CatalogSnapshot::load(Arc::clone(&self.source))?);
        self.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Discover aggregates for every star of the schema.
    ///
    /// A star hitting the error ceiling aborts the whole run. Otherwise every
    /// star is processed and, if any errors were recorded, `LoadFailed` is
    /// returned with the full report; the aggregates accepted along the way
    /// stay registered.
    pub fn discover(&mut self, schema: &StarSchema) -> AggResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        for star in schema.stars() {
            report.stars.push(self.discover_star(schema, star)?);
        }

        let errors = report.error_count();
        if errors > 0 {
            tracing::error!(errors, "aggregate loading failed");
            return Err(AggError::LoadFailed { errors, report });
        }
        Ok(report)
    }

    /// Drop the catalog snapshot and discover again.
    pub fn reload(&mut self, schema: &StarSchema) -> AggResult<DiscoveryReport> {
        tracing::info!("reloading aggregate tables");
        self.snapshot = None;
        self.discover(schema)
    }

    /// Discover aggregates for a single star.
    ///
    /// Recorded errors do not fail this call; they are reported in the
    /// returned [`StarReport`]. Only the error ceiling yields `Err`, in which
    /// case the star's list is cleared if scanning had begun.
    pub fn discover_star(&mut self, schema: &StarSchema, star: &LogicalStar) -> AggResult<StarReport> {
        let snapshot = self.snapshot()?;
        let mut recorder = MessageRecorder::with_error_limit(self.settings.recorder.error_limit);
        let mut state = DiscoveryState::Idle;

        let outcome = self.load_star(schema, star, &snapshot, &mut state, &mut recorder);
        recorder.log_messages();

        let registered = match outcome {
            Ok(Some(aggregates)) => {
                let names: Vec<String> = aggregates.iter().map(|a| a.name().to_string()).collect();
                star.replace_aggregates(aggregates);
                snapshot.mark_aggregates(star.name(), &names);
                state = DiscoveryState::Committed;
                names
            }
            Ok(None) => Vec::new(),
            Err(source) => {
                if state == DiscoveryState::Scanning {
                    star.replace_aggregates(Vec::new());
                    snapshot.mark_aggregates(star.name(), &[]);
                }
                tracing::error!(star = star.name(), error = %source, "aggregate discovery aborted");
                return Err(AggError::Aborted {
                    star: star.name().to_string(),
                    source,
                    messages: recorder.take_messages(),
                });
            }
        };

        tracing::info!(
            star = star.name(),
            state = %state,
            registered = registered.len(),
            "aggregate discovery finished"
        );
        Ok(StarReport::new(star.name(), state, registered, &recorder))
    }

    /// Run the state machine for one star. `Ok(None)` leaves the star untouched.
    fn load_star(
        &self,
        schema: &StarSchema,
        star: &LogicalStar,
        snapshot: &CatalogSnapshot,
        state: &mut DiscoveryState,
        recorder: &mut MessageRecorder,
    ) -> RecorderResult<Option<Vec<AggregateCandidate>>> {
        let mut scope = recorder.scoped(star.name());

        let groups = gather_rule_groups(schema, star, &mut scope)?;
        *state = DiscoveryState::RuleGroupsGathered;

        let fact_name = star.fact_table();
        let Some(fact_table) = snapshot.table(fact_name) else {
            scope.report_warning(format!("no table found for fact table '{}'", fact_name));
            *state = DiscoveryState::Skipped;
            return Ok(None);
        };
        let fact_columns = match snapshot.columns(fact_table) {
            Ok(columns) => columns,
            Err(e) => {
                *state = DiscoveryState::Skipped;
                scope.report_error(format!(
                    "failed to load columns of fact table '{}': {}",
                    fact_table.name(),
                    e
                ))?;
                return Ok(None);
            }
        };
        let fact = bind_fact_table(star, fact_table.name(), fact_columns, &mut scope);
        snapshot.mark_usage(fact_table.name(), TableUsage::Fact);
        let fact_rows = fact_table.info().row_count;
        *state = DiscoveryState::FactTableBound;

        *state = DiscoveryState::Scanning;
        let mut aggregates: Vec<AggregateCandidate> = Vec::new();
        for table in snapshot.tables() {
            if std::ptr::eq(table, fact_table) {
                continue;
            }
            if exclude_table(table.name(), &groups) {
                tracing::debug!(star = star.name(), table = table.name(), "table excluded");
                continue;
            }
            if let Some(candidate) =
                self.match_candidate(star, &fact, fact_rows, snapshot, table, &groups, &mut scope)?
            {
                let pos = aggregates.partition_point(|a| a.cost <= candidate.cost);
                aggregates.insert(pos, candidate);
            }
        }

        Ok(Some(aggregates))
    }

    /// Explicit rules first, default rules second; build the candidate.
    fn match_candidate(
        &self,
        star: &LogicalStar,
        fact: &BindingResult,
        fact_rows: Option<u64>,
        snapshot: &CatalogSnapshot,
        table: &CatalogTable,
        groups: &[RuleGroup],
        recorder: &mut MessageRecorder,
    ) -> RecorderResult<Option<AggregateCandidate>> {
        let name = table.name();
        let include = include_by_table_def(name, groups);
        let default_match = self.default_rules.matches_table_name(star.fact_table(), name);
        if include.is_none() && !default_match {
            tracing::debug!(star = star.name(), table = name, "not an aggregate candidate");
            return Ok(None);
        }

        let mut scope = recorder.scoped(name);
        let columns = match snapshot.columns(table) {
            Ok(columns) => columns,
            Err(e) => {
                scope.report_error(format!("failed to load columns of '{}': {}", name, e))?;
                return Ok(None);
            }
        };

        let mut accepted = None;
        if let Some(def) = include {
            let binding = def.columns_ok(star, fact, name, columns, &mut scope);
            if binding.is_valid() {
                accepted = Some((
                    binding,
                    CostHint::from(def.approx_row_count()),
                    RuleSource::Explicit {
                        group: def.group().to_string(),
                    },
                ));
            } else {
                tracing::debug!(table = name, group = def.group(), "explicit rule did not validate");
            }
        }
        if accepted.is_none() && default_match {
            let binding = self.default_rules.columns_ok(star, fact, name, columns, &mut scope);
            if binding.is_valid() {
                accepted = Some((binding, CostHint::Unknown, RuleSource::Default));
            }
        }

        let Some((binding, hint, source)) = accepted else {
            tracing::debug!(star = star.name(), table = name, "columns did not validate, skipped");
            return Ok(None);
        };

        match AggregateCandidate::build(table.info(), binding, hint, source, fact_rows) {
            Ok(candidate) => {
                tracing::debug!(star = star.name(), table = name, cost = candidate.cost, "aggregate accepted");
                Ok(Some(candidate))
            }
            Err(rejection) => {
                scope.report_warning(format!(
                    "aggregate table '{}' of fact table '{}' has non-positive cost {}, discarded",
                    name,
                    star.fact_table(),
                    rejection.cost
                ));
                Ok(None)
            }
        }
    }
}

/// Validate every rule group of the cubes using this star.
fn gather_rule_groups(
    schema: &StarSchema,
    star: &LogicalStar,
    recorder: &mut MessageRecorder,
) -> RecorderResult<Vec<RuleGroup>> {
    let mut groups = Vec::new();
    for cube in schema.cubes_using(star) {
        if let Some(rules) = &cube.rules {
            groups.push(rules.validate(recorder)?);
        }
    }
    Ok(groups)
}
