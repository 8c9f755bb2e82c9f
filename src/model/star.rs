//! Logical star definitions - a fact table, its measures and join keys.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::candidate::AggregateCandidate;

/// Aggregation function of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregator {
    Sum,
    Count,
    Min,
    Max,
    Avg,
    DistinctCount,
}

impl Aggregator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregator::Sum => "sum",
            Aggregator::Count => "count",
            Aggregator::Min => "min",
            Aggregator::Max => "max",
            Aggregator::Avg => "avg",
            Aggregator::DistinctCount => "distinct-count",
        }
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Aggregator::Sum),
            "count" => Ok(Aggregator::Count),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            "avg" => Ok(Aggregator::Avg),
            "distinct-count" | "distinct_count" => Ok(Aggregator::DistinctCount),
            other => Err(format!("unknown aggregator: {}", other)),
        }
    }
}

/// The logical role of one fact-table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum FactColumnRole {
    /// A measure reading `column` and rolled up with `aggregator`.
    Measure {
        name: String,
        column: String,
        aggregator: Aggregator,
    },
    /// A join key leading to a dimension table.
    ForeignKey { column: String, target_table: String },
    /// A column the star tracks that is neither a measure nor a join key.
    Plain { column: String },
}

impl FactColumnRole {
    /// The fact column this role reads.
    pub fn column(&self) -> &str {
        match self {
            FactColumnRole::Measure { column, .. } => column,
            FactColumnRole::ForeignKey { column, .. } => column,
            FactColumnRole::Plain { column } => column,
        }
    }
}

/// A fact table plus its measures and dimension linkages.
///
/// The registered aggregate list is replaced wholesale by each discovery
/// run; readers always see a complete list.
#[derive(Debug)]
pub struct LogicalStar {
    name: String,
    fact_table: String,
    fact_alias: Option<String>,
    roles: Vec<FactColumnRole>,
    aggregates: RwLock<Arc<Vec<AggregateCandidate>>>,
}

impl LogicalStar {
    pub fn new(name: impl Into<String>, fact_table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fact_table: fact_table.into(),
            fact_alias: None,
            roles: Vec::new(),
            aggregates: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.fact_alias = Some(alias.into());
        self
    }

    pub fn with_measure(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        aggregator: Aggregator,
    ) -> Self {
        self.roles.push(FactColumnRole::Measure {
            name: name.into(),
            column: column.into(),
            aggregator,
        });
        self
    }

    pub fn with_foreign_key(
        mut self,
        column: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        self.roles.push(FactColumnRole::ForeignKey {
            column: column.into(),
            target_table: target_table.into(),
        });
        self
    }

    pub fn with_plain(mut self, column: impl Into<String>) -> Self {
        self.roles.push(FactColumnRole::Plain {
            column: column.into(),
        });
        self
    }

    pub fn with_role(mut self, role: FactColumnRole) -> Self {
        self.roles.push(role);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Physical name of the fact table.
    pub fn fact_table(&self) -> &str {
        &self.fact_table
    }

    /// Alias used in generated SQL, defaulting to the table name.
    pub fn fact_alias(&self) -> &str {
        self.fact_alias.as_deref().unwrap_or(&self.fact_table)
    }

    pub fn roles(&self) -> &[FactColumnRole] {
        &self.roles
    }

    /// Roles reading the given fact column (case-insensitive).
    pub fn roles_for_column<'a>(
        &'a self,
        column: &'a str,
    ) -> impl Iterator<Item = &'a FactColumnRole> + 'a {
        self.roles
            .iter()
            .filter(move |r| r.column().eq_ignore_ascii_case(column))
    }

    /// Find a measure role by logical name (case-insensitive).
    pub fn measure(&self, name: &str) -> Option<&FactColumnRole> {
        self.roles.iter().find(|r| {
            matches!(r, FactColumnRole::Measure { name: n, .. } if n.eq_ignore_ascii_case(name))
        })
    }

    /// The currently registered aggregates, ordered by ascending cost.
    pub fn aggregates(&self) -> Arc<Vec<AggregateCandidate>> {
        let guard = self.aggregates.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a complete new aggregate list.
    pub(crate) fn replace_aggregates(&self, aggregates: Vec<AggregateCandidate>) {
        let next = Arc::new(aggregates);
        let mut guard = self.aggregates.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }
}
