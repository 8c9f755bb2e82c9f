//! Naming-convention rules used when no explicit rule applies.
//!
//! A candidate is an aggregate of fact table `F` when its name matches one of
//! the table templates with `${fact_name}` replaced by `F` (by default
//! `agg_.+_${fact_name}`, case-insensitive). Its columns are then explained
//! purely by convention; the fact-count column and the configured ignore
//! patterns are left unbound without a warning.

use dashmap::DashMap;
use regex::Regex;

use crate::binder::BindingResult;
use crate::catalog::ColumnInfo;
use crate::config::{DefaultRuleSettings, SettingsError, SettingsResult};
use crate::model::LogicalStar;
use crate::recorder::MessageRecorder;

use super::naming::{anchored_regex, expand_template, FACT_NAME_TOKEN};
use super::recognizer::{recognize, ColumnPolicy};

/// Convention-based aggregate rules.
///
/// Holds no per-schema state; compiled table patterns are cached per fact
/// table name.
#[derive(Debug)]
pub struct DefaultRules {
    table_templates: Vec<String>,
    ignore_case: bool,
    fact_count_column: String,
    ignore_columns: Vec<Regex>,
    table_patterns: DashMap<String, Vec<Regex>>,
}

impl Default for DefaultRules {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultRules {
    pub fn new() -> Self {
        let settings = DefaultRuleSettings::default();
        Self {
            table_templates: settings.table_templates,
            ignore_case: settings.ignore_case,
            fact_count_column: settings.fact_count_column,
            ignore_columns: Vec::new(),
            table_patterns: DashMap::new(),
        }
    }

    /// Build rules from settings, checking every template and pattern.
    pub fn from_settings(settings: &DefaultRuleSettings) -> SettingsResult<Self> {
        if settings.table_templates.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "default_rules.table_templates must not be empty".to_string(),
            ));
        }
        for template in &settings.table_templates {
            if !template.contains(FACT_NAME_TOKEN) {
                return Err(SettingsError::InvalidConfig(format!(
                    "table template '{}' does not reference {}",
                    template, FACT_NAME_TOKEN
                )));
            }
            anchored_regex(&expand_template(template, "fact"), settings.ignore_case).map_err(
                |e| SettingsError::InvalidConfig(format!("table template '{}': {}", template, e)),
            )?;
        }

        let ignore_columns = settings
            .ignore_columns
            .iter()
            .map(|p| {
                anchored_regex(p, true).map_err(|e| {
                    SettingsError::InvalidConfig(format!("ignore column pattern '{}': {}", p, e))
                })
            })
            .collect::<SettingsResult<Vec<_>>>()?;

        Ok(Self {
            table_templates: settings.table_templates.clone(),
            ignore_case: settings.ignore_case,
            fact_count_column: settings.fact_count_column.clone(),
            ignore_columns,
            table_patterns: DashMap::new(),
        })
    }

    pub fn fact_count_column(&self) -> &str {
        &self.fact_count_column
    }

    /// Whether `candidate` is named like an aggregate of `fact_table`.
    pub fn matches_table_name(&self, fact_table: &str, candidate: &str) -> bool {
        if let Some(patterns) = self.table_patterns.get(fact_table) {
            return patterns.iter().any(|re| re.is_match(candidate));
        }

        let patterns: Vec<Regex> = self
            .table_templates
            .iter()
            .filter_map(|template| {
                let expanded = expand_template(template, fact_table);
                match anchored_regex(&expanded, self.ignore_case) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::debug!(template = %template, error = %e, "skipping table template");
                        None
                    }
                }
            })
            .collect();
        let matched = patterns.iter().any(|re| re.is_match(candidate));
        self.table_patterns.insert(fact_table.to_string(), patterns);
        matched
    }

    /// Bind the candidate's columns by convention alone.
    pub fn columns_ok(
        &self,
        star: &LogicalStar,
        fact: &BindingResult,
        table: &str,
        columns: &[ColumnInfo],
        recorder: &mut MessageRecorder,
    ) -> BindingResult {
        let policy = ColumnPolicy {
            overrides: &[],
            ignore: &self.ignore_columns,
            fact_count: &self.fact_count_column,
        };
        recognize(star, fact, table, columns, &policy, recorder)
    }
}
