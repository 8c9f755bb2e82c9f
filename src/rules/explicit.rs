//! Explicit aggregate rules authored in the schema.
//!
//! A cube may carry an [`ExplicitRuleGroup`]: include rules naming (or
//! matching) aggregate tables, with optional per-column overrides, and
//! exclude matchers removing tables from consideration altogether.
//!
//! Groups are plain definitions. Each discovery run validates them into
//! compiled [`RuleGroup`]s; malformed rules are reported as errors and
//! dropped while the rest of the group stays usable.
//!
//! ```toml
//! name = "sales"
//!
//! [[include]]
//! name = "agg_bad"
//! approx_row_count = 1200
//! columns = [{ kind = "foreign_key", column = "product_id", fact_column = "product_id" }]
//!
//! [[include]]
//! pattern = "agg_.*_sales"
//! ignore_columns = ["load_.*"]
//!
//! [[exclude]]
//! name = "agg_old_sales"
//! ignore_case = true
//! ```

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::binder::BindingResult;
use crate::catalog::ColumnInfo;
use crate::model::LogicalStar;
use crate::recorder::{MessageRecorder, RecorderResult};

use super::naming::anchored_regex;
use super::recognizer::{recognize, ColumnPolicy};

fn default_fact_count() -> String {
    "fact_count".to_string()
}

/// Matches table names either by exact name or by regular expression.
///
/// Exactly one of `name` and `pattern` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMatcher {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub ignore_case: bool,
}

impl TableMatcher {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn describe(&self) -> String {
        match (&self.name, &self.pattern) {
            (Some(name), _) => format!("name '{}'", name),
            (None, Some(pattern)) => format!("pattern '{}'", pattern),
            (None, None) => "empty matcher".to_string(),
        }
    }

    fn compile(&self) -> Result<CompiledMatcher, String> {
        match (&self.name, &self.pattern) {
            (Some(name), None) => Ok(CompiledMatcher::Name {
                name: name.clone(),
                ignore_case: self.ignore_case,
            }),
            (None, Some(pattern)) => anchored_regex(pattern, self.ignore_case)
                .map(CompiledMatcher::Pattern)
                .map_err(|e| format!("invalid table pattern '{}': {}", pattern, e)),
            (Some(_), Some(_)) => Err(format!(
                "{} sets both a name and a pattern",
                self.describe()
            )),
            (None, None) => Err("table matcher has neither a name nor a pattern".to_string()),
        }
    }
}

/// Binds one candidate column explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnOverride {
    /// The column holds the rolled-up values of a star measure.
    Measure { column: String, measure: String },
    /// The column is the retained fact column `fact_column`.
    ForeignKey { column: String, fact_column: String },
    /// The column is deliberately left unbound.
    Ignore { column: String },
}

impl ColumnOverride {
    pub fn column(&self) -> &str {
        match self {
            ColumnOverride::Measure { column, .. } => column,
            ColumnOverride::ForeignKey { column, .. } => column,
            ColumnOverride::Ignore { column } => column,
        }
    }
}

/// Declares matching tables to be aggregates of the star.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRule {
    #[serde(flatten)]
    pub matcher: TableMatcher,

    /// Per-column bindings that bypass naming conventions.
    #[serde(default)]
    pub columns: Vec<ColumnOverride>,

    /// Column name patterns left unbound without a warning.
    #[serde(default)]
    pub ignore_columns: Vec<String>,

    #[serde(default = "default_fact_count")]
    pub fact_count: String,

    /// Approximate row count used as the candidate's cost.
    #[serde(default)]
    pub approx_row_count: Option<i64>,
}

impl IncludeRule {
    pub fn new(matcher: TableMatcher) -> Self {
        Self {
            matcher,
            columns: Vec::new(),
            ignore_columns: Vec::new(),
            fact_count: default_fact_count(),
            approx_row_count: None,
        }
    }

    pub fn with_override(mut self, column_override: ColumnOverride) -> Self {
        self.columns.push(column_override);
        self
    }

    pub fn with_ignored_column(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_columns.push(pattern.into());
        self
    }

    pub fn with_approx_row_count(mut self, rows: i64) -> Self {
        self.approx_row_count = Some(rows);
        self
    }
}

/// A cube's explicit aggregate rules, as authored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitRuleGroup {
    pub name: String,
    #[serde(default, rename = "include")]
    pub includes: Vec<IncludeRule>,
    #[serde(default, rename = "exclude")]
    pub excludes: Vec<TableMatcher>,
}

impl ExplicitRuleGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn with_include(mut self, rule: IncludeRule) -> Self {
        self.includes.push(rule);
        self
    }

    pub fn with_exclude(mut self, matcher: TableMatcher) -> Self {
        self.excludes.push(matcher);
        self
    }

    /// Structurally check the group and compile its matchers.
    ///
    /// Each malformed rule is reported as an error and left out of the result.
    /// Fails only when the recorder's error ceiling is reached.
    pub fn validate(&self, recorder: &mut MessageRecorder) -> RecorderResult<RuleGroup> {
        let mut scope = recorder.scoped(self.name.as_str());
        let mut includes = Vec::new();
        let mut excludes = Vec::new();

        for (idx, rule) in self.includes.iter().enumerate() {
            match compile_include(&self.name, rule) {
                Ok(def) => includes.push(def),
                Err(reason) => scope.report_error_with(
                    format!("include rule {} ({}): {}", idx, rule.matcher.describe(), reason),
                    serde_json::json!({ "group": self.name, "include": idx }),
                )?,
            }
        }

        for (idx, matcher) in self.excludes.iter().enumerate() {
            match matcher.compile() {
                Ok(compiled) => excludes.push(compiled),
                Err(reason) => scope.report_error_with(
                    format!("exclude rule {}: {}", idx, reason),
                    serde_json::json!({ "group": self.name, "exclude": idx }),
                )?,
            }
        }

        Ok(RuleGroup {
            name: self.name.clone(),
            includes,
            excludes,
        })
    }
}

fn compile_include(group: &str, rule: &IncludeRule) -> Result<IncludeDef, String> {
    let matcher = rule.matcher.compile()?;

    let ignore = rule
        .ignore_columns
        .iter()
        .map(|p| {
            anchored_regex(p, true).map_err(|e| format!("invalid ignore pattern '{}': {}", p, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    for column_override in &rule.columns {
        if !seen.insert(column_override.column().to_lowercase()) {
            return Err(format!(
                "column '{}' is overridden more than once",
                column_override.column()
            ));
        }
    }

    Ok(IncludeDef {
        group: group.to_string(),
        rule: rule.clone(),
        matcher,
        ignore,
    })
}

#[derive(Debug, Clone)]
enum CompiledMatcher {
    Name { name: String, ignore_case: bool },
    Pattern(Regex),
}

impl CompiledMatcher {
    fn matches(&self, table: &str) -> bool {
        match self {
            CompiledMatcher::Name { name, ignore_case } => {
                if *ignore_case {
                    name.eq_ignore_ascii_case(table)
                } else {
                    name == table
                }
            }
            CompiledMatcher::Pattern(re) => re.is_match(table),
        }
    }
}

/// A validated include rule.
#[derive(Debug, Clone)]
pub struct IncludeDef {
    group: String,
    rule: IncludeRule,
    matcher: CompiledMatcher,
    ignore: Vec<Regex>,
}

impl IncludeDef {
    /// Name of the rule group this rule came from.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn rule(&self) -> &IncludeRule {
        &self.rule
    }

    pub fn matches(&self, table: &str) -> bool {
        self.matcher.matches(table)
    }

    pub fn approx_row_count(&self) -> Option<i64> {
        self.rule.approx_row_count
    }

    /// Bind the candidate's columns under this rule.
    ///
    /// Overridden columns bind as declared; all others must be explainable by
    /// convention (or ignorable). The result is invalid when an override does
    /// not resolve, a column is ambiguous, or no measure is bound.
    pub fn columns_ok(
        &self,
        star: &LogicalStar,
        fact: &BindingResult,
        table: &str,
        columns: &[ColumnInfo],
        recorder: &mut MessageRecorder,
    ) -> BindingResult {
        let policy = ColumnPolicy {
            overrides: &self.rule.columns,
            ignore: &self.ignore,
            fact_count: &self.rule.fact_count,
        };
        recognize(star, fact, table, columns, &policy, recorder)
    }
}

/// A validated rule group.
#[derive(Debug, Clone)]
pub struct RuleGroup {
    name: String,
    includes: Vec<IncludeDef>,
    excludes: Vec<CompiledMatcher>,
}

impl RuleGroup {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn includes(&self) -> &[IncludeDef] {
        &self.includes
    }

    pub fn excludes_table(&self, table: &str) -> bool {
        self.excludes.iter().any(|m| m.matches(table))
    }
}

/// True when any exclude of any group matches the table.
pub fn exclude_table(table: &str, groups: &[RuleGroup]) -> bool {
    groups.iter().any(|g| g.excludes_table(table))
}

/// The first include matching the table, in group order then rule order.
pub fn include_by_table_def<'g>(table: &str, groups: &'g [RuleGroup]) -> Option<&'g IncludeDef> {
    groups
        .iter()
        .flat_map(|g| g.includes.iter())
        .find(|def| def.matches(table))
}
