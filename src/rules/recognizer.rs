//! Column recognizer shared by explicit and default rules.
//!
//! Explains each candidate column against the fact binding:
//!
//! 1. Per-column overrides (explicit rules only) bind first.
//! 2. Ignorable columns (fact count, ignore patterns) stay unassigned.
//! 3. Remaining columns are matched by convention: a measure's snake-cased
//!    name or `{column}_{aggregator}` beats the bare fact column name; join
//!    keys and retained columns match the fact column name.
//!
//! The binding is valid when every override resolved, no column carries two
//! distinct usages, and at least one measure is bound.

use regex::Regex;

use crate::binder::{BindingResult, ColumnBinding, ColumnUsage, JoinTarget};
use crate::catalog::ColumnInfo;
use crate::model::{FactColumnRole, LogicalStar};
use crate::recorder::MessageRecorder;

use super::explicit::ColumnOverride;
use super::naming::measure_column_name;

/// Which columns a rule binds explicitly and which it allows to be ignored.
pub(crate) struct ColumnPolicy<'a> {
    pub overrides: &'a [ColumnOverride],
    pub ignore: &'a [Regex],
    pub fact_count: &'a str,
}

/// Expected convention names derived from the fact binding.
struct Expectations {
    // (lowercase name, usage) matched by measure name or column_aggregator
    by_measure_name: Vec<(String, ColumnUsage)>,
    // (lowercase fact column, usage) for measures
    by_measure_column: Vec<(String, ColumnUsage)>,
    // (lowercase fact column, usage) for join keys and retained columns
    by_key_column: Vec<(String, ColumnUsage)>,
}

impl Expectations {
    fn from_fact(fact: &BindingResult) -> Self {
        let mut expectations = Self {
            by_measure_name: Vec::new(),
            by_measure_column: Vec::new(),
            by_key_column: Vec::new(),
        };
        for binding in fact.assigned() {
            let column = binding.column.to_lowercase();
            for usage in &binding.usages {
                match usage {
                    ColumnUsage::Measure {
                        measure,
                        aggregator,
                    } => {
                        expectations
                            .by_measure_name
                            .push((measure_column_name(measure), usage.clone()));
                        expectations.by_measure_name.push((
                            format!("{}_{}", column, aggregator.as_str().replace('-', "_")),
                            usage.clone(),
                        ));
                        expectations
                            .by_measure_column
                            .push((column.clone(), usage.clone()));
                    }
                    ColumnUsage::JoinKey { .. } => {
                        expectations
                            .by_key_column
                            .push((column.clone(), usage.clone()));
                    }
                    ColumnUsage::Unassigned => {}
                }
            }
        }
        expectations
    }

    fn explain(&self, column: &str) -> Vec<ColumnUsage> {
        let column = column.to_lowercase();
        let mut usages = matching(&self.by_measure_name, &column);
        if usages.is_empty() {
            usages = matching(&self.by_measure_column, &column);
        }
        for usage in matching(&self.by_key_column, &column) {
            if !usages.contains(&usage) {
                usages.push(usage);
            }
        }
        usages
    }
}

fn matching(expected: &[(String, ColumnUsage)], column: &str) -> Vec<ColumnUsage> {
    let mut usages: Vec<ColumnUsage> = Vec::new();
    for (name, usage) in expected {
        if name == column && !usages.contains(usage) {
            usages.push(usage.clone());
        }
    }
    usages
}

/// Bind a candidate table's columns and decide whether it is a valid aggregate.
pub(crate) fn recognize(
    star: &LogicalStar,
    fact: &BindingResult,
    table: &str,
    columns: &[ColumnInfo],
    policy: &ColumnPolicy<'_>,
    recorder: &mut MessageRecorder,
) -> BindingResult {
    let mut valid = true;
    let mut usages: Vec<Vec<ColumnUsage>> = vec![Vec::new(); columns.len()];
    let mut overridden = vec![false; columns.len()];

    for column_override in policy.overrides {
        let name = column_override.column();
        let Some(idx) = columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
        else {
            recorder.report_info(format!(
                "column '{}' named by rule not found in '{}'",
                name, table
            ));
            valid = false;
            continue;
        };
        overridden[idx] = true;

        match resolve_override(star, column_override) {
            Ok(Some(usage)) => usages[idx].push(usage),
            Ok(None) => {
                tracing::debug!(table, column = name, "column ignored by rule");
            }
            Err(reason) => {
                recorder.report_warning(reason);
                valid = false;
            }
        }
    }

    let expectations = Expectations::from_fact(fact);
    for (idx, column) in columns.iter().enumerate() {
        if overridden[idx] {
            continue;
        }
        if is_ignorable(&column.name, policy) {
            tracing::debug!(table, column = %column.name, "ignorable column left unassigned");
            continue;
        }
        let explained = expectations.explain(&column.name);
        if explained.is_empty() {
            recorder.report_warning(format!(
                "column '{}' in '{}' does not match any measure or join key of '{}'",
                column.name, table, fact.table
            ));
        }
        usages[idx] = explained;
    }

    for (column, column_usages) in columns.iter().zip(&usages) {
        if column_usages.len() > 1 {
            let roles: Vec<String> = column_usages.iter().map(|u| u.to_string()).collect();
            recorder.report_warning(format!(
                "column '{}' in '{}' binds to conflicting roles: {}",
                column.name,
                table,
                roles.join(", ")
            ));
            valid = false;
        }
    }

    let result = BindingResult {
        table: table.to_string(),
        columns: columns
            .iter()
            .zip(usages)
            .map(|(column, column_usages)| {
                ColumnBinding::with_usages(column.name.as_str(), column_usages)
            })
            .collect(),
        valid,
    };

    if result.measure_count() == 0 {
        recorder.report_info(format!("'{}' has no measure columns", table));
        return BindingResult {
            valid: false,
            ..result
        };
    }
    result
}

fn is_ignorable(column: &str, policy: &ColumnPolicy<'_>) -> bool {
    column.eq_ignore_ascii_case(policy.fact_count) || policy.ignore.iter().any(|re| re.is_match(column))
}

/// Resolve an override to a usage. `Ok(None)` means the column is ignored.
fn resolve_override(
    star: &LogicalStar,
    column_override: &ColumnOverride,
) -> Result<Option<ColumnUsage>, String> {
    match column_override {
        ColumnOverride::Measure { measure, .. } => match star.measure(measure) {
            Some(FactColumnRole::Measure {
                name, aggregator, ..
            }) => Ok(Some(ColumnUsage::Measure {
                measure: name.clone(),
                aggregator: *aggregator,
            })),
            _ => Err(format!(
                "measure '{}' is not defined on star '{}'",
                measure,
                star.name()
            )),
        },
        ColumnOverride::ForeignKey { fact_column, .. } => {
            let mut roles = star.roles_for_column(fact_column);
            let key = roles.find_map(|role| match role {
                FactColumnRole::ForeignKey { target_table, .. } => {
                    Some(JoinTarget::Dimension(target_table.clone()))
                }
                FactColumnRole::Plain { .. } => Some(JoinTarget::Retained),
                FactColumnRole::Measure { .. } => None,
            });
            match key {
                Some(target) => Ok(Some(ColumnUsage::JoinKey { target })),
                None => Err(format!(
                    "fact column '{}' is not a join key of star '{}'",
                    fact_column,
                    star.name()
                )),
            }
        }
        ColumnOverride::Ignore { .. } => Ok(None),
    }
}
