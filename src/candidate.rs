//! Aggregate candidates - validated bindings with a resolved cost.

use serde::Serialize;
use thiserror::Error;

use crate::binder::BindingResult;
use crate::catalog::TableInfo;

/// Where a candidate's cost comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostHint {
    /// Row count supplied by an explicit rule.
    Approx(i64),
    /// No hint; estimate from the catalog or the binding.
    Unknown,
}

impl From<Option<i64>> for CostHint {
    fn from(rows: Option<i64>) -> Self {
        rows.map(CostHint::Approx).unwrap_or(CostHint::Unknown)
    }
}

/// The rule path that accepted a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSource {
    Explicit { group: String },
    Default,
}

/// A structurally valid candidate whose cost resolved to zero or less.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("aggregate table '{table}' has non-positive cost {cost}")]
pub struct ZeroCostRejection {
    pub table: String,
    pub cost: i64,
}

/// A registrable aggregate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateCandidate {
    pub table: TableInfo,
    pub binding: BindingResult,
    /// Estimated rows; lower is cheaper. Always positive once registered.
    ///
    /// Falls back to the number of bound columns only when neither the
    /// candidate nor the fact table has a row count.
    pub cost: i64,
    pub source: RuleSource,
}

impl AggregateCandidate {
    /// Resolve the cost and build the candidate.
    ///
    /// An explicit hint is used as is. Without one, the candidate's catalog
    /// row count is used when known, else one row fewer than the fact table,
    /// else the number of bound columns.
    pub fn build(
        table: &TableInfo,
        binding: BindingResult,
        hint: CostHint,
        source: RuleSource,
        fact_rows: Option<u64>,
    ) -> Result<Self, ZeroCostRejection> {
        let cost = resolve_cost(table, &binding, hint, fact_rows);
        if cost <= 0 {
            return Err(ZeroCostRejection {
                table: table.name.clone(),
                cost,
            });
        }
        Ok(Self {
            table: table.clone(),
            binding,
            cost,
            source,
        })
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }
}

fn resolve_cost(
    table: &TableInfo,
    binding: &BindingResult,
    hint: CostHint,
    fact_rows: Option<u64>,
) -> i64 {
    match hint {
        CostHint::Approx(rows) => rows,
        CostHint::Unknown => match (table.row_count, fact_rows) {
            (Some(rows), _) => rows_to_cost(rows),
            (None, Some(fact_rows)) if fact_rows > 1 => rows_to_cost(fact_rows - 1),
            _ => binding.assigned().count() as i64,
        },
    }
}

fn rows_to_cost(rows: u64) -> i64 {
    i64::try_from(rows).unwrap_or(i64::MAX)
}
