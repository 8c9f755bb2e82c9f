//! Column binding.
//!
//! Assigns every physical column of a table a usage relative to a star:
//! a rolled-up measure, a join key, or nothing. The fact table is bound first
//! ([`bind_fact_table`]); candidate aggregate tables are then explained
//! against that fact binding by the rule engine.

use std::fmt;

use serde::Serialize;

use crate::catalog::ColumnInfo;
use crate::model::{Aggregator, FactColumnRole, LogicalStar};
use crate::recorder::MessageRecorder;

/// What a join-key usage leads to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "table", rename_all = "snake_case")]
pub enum JoinTarget {
    /// A real foreign key into a dimension table.
    Dimension(String),
    /// A plain fact column carried through verbatim.
    Retained,
}

/// The usage assigned to a physical column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "usage", rename_all = "snake_case")]
pub enum ColumnUsage {
    Measure {
        measure: String,
        aggregator: Aggregator,
    },
    /// Join key, also used for retained plain fact columns.
    JoinKey { target: JoinTarget },
    Unassigned,
}

impl ColumnUsage {
    pub fn is_assigned(&self) -> bool {
        !matches!(self, ColumnUsage::Unassigned)
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, ColumnUsage::Measure { .. })
    }
}

impl fmt::Display for ColumnUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnUsage::Measure {
                measure,
                aggregator,
            } => write!(f, "measure {}({})", aggregator, measure),
            ColumnUsage::JoinKey {
                target: JoinTarget::Dimension(table),
            } => write!(f, "join key -> {}", table),
            ColumnUsage::JoinKey {
                target: JoinTarget::Retained,
            } => write!(f, "retained column"),
            ColumnUsage::Unassigned => write!(f, "unassigned"),
        }
    }
}

static UNASSIGNED: ColumnUsage = ColumnUsage::Unassigned;

/// The usages of one physical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub column: String,
    /// Never empty; an unbound column holds a single `Unassigned`.
    pub usages: Vec<ColumnUsage>,
}

impl ColumnBinding {
    pub fn unassigned(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            usages: vec![ColumnUsage::Unassigned],
        }
    }

    pub fn with_usages(column: impl Into<String>, usages: Vec<ColumnUsage>) -> Self {
        if usages.is_empty() {
            return Self::unassigned(column);
        }
        Self {
            column: column.into(),
            usages,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.usages.iter().any(ColumnUsage::is_assigned)
    }

    /// The first usage of this column; `Unassigned` when none is recorded.
    pub fn usage(&self) -> &ColumnUsage {
        self.usages.first().unwrap_or(&UNASSIGNED)
    }
}

/// Column bindings of one table plus the validity verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingResult {
    pub table: String,
    /// One entry per physical column, in catalog order.
    pub columns: Vec<ColumnBinding>,
    pub valid: bool,
}

impl BindingResult {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Binding for a column (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnBinding> {
        self.columns
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(name))
    }

    /// Usages of a column, empty when the column is unknown.
    pub fn usages_of(&self, name: &str) -> &[ColumnUsage] {
        self.column(name).map(|c| c.usages.as_slice()).unwrap_or(&[])
    }

    /// Columns bound to at least one usage.
    pub fn assigned(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.columns.iter().filter(|c| c.is_assigned())
    }

    pub fn measure_count(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|c| c.usages.iter())
            .filter(|u| u.is_measure())
            .count()
    }
}

/// Bind each fact-table column to the star's roles.
///
/// Measures take precedence over join keys, join keys over retained plain
/// columns. A column may carry several measure usages. Unbound columns are
/// expected and only noted at debug level; a role naming a column that the
/// physical fact table lacks is a warning.
pub fn bind_fact_table(
    star: &LogicalStar,
    table: &str,
    columns: &[ColumnInfo],
    recorder: &mut MessageRecorder,
) -> BindingResult {
    let bindings = columns
        .iter()
        .map(|column| {
            let usages = fact_usages(star, &column.name);
            if usages.is_empty() {
                tracing::debug!(
                    star = star.name(),
                    column = %column.name,
                    "fact column has no role"
                );
            }
            ColumnBinding::with_usages(column.name.as_str(), usages)
        })
        .collect();

    for role in star.roles() {
        let present = columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(role.column()));
        if !present {
            recorder.report_warning(format!(
                "column '{}' of star '{}' not found in fact table '{}'",
                role.column(),
                star.name(),
                table
            ));
        }
    }

    BindingResult {
        table: table.to_string(),
        columns: bindings,
        valid: true,
    }
}

fn fact_usages(star: &LogicalStar, column: &str) -> Vec<ColumnUsage> {
    let roles: Vec<&FactColumnRole> = star.roles_for_column(column).collect();

    let measures: Vec<ColumnUsage> = roles
        .iter()
        .filter_map(|role| match role {
            FactColumnRole::Measure {
                name, aggregator, ..
            } => Some(ColumnUsage::Measure {
                measure: name.clone(),
                aggregator: *aggregator,
            }),
            _ => None,
        })
        .collect();
    if !measures.is_empty() {
        return measures;
    }

    let keys: Vec<ColumnUsage> = roles
        .iter()
        .filter_map(|role| match role {
            FactColumnRole::ForeignKey { target_table, .. } => Some(ColumnUsage::JoinKey {
                target: JoinTarget::Dimension(target_table.clone()),
            }),
            _ => None,
        })
        .collect();
    if !keys.is_empty() {
        return keys;
    }

    if roles
        .iter()
        .any(|role| matches!(role, FactColumnRole::Plain { .. }))
    {
        return vec![ColumnUsage::JoinKey {
            target: JoinTarget::Retained,
        }];
    }

    Vec::new()
}
