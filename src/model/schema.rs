//! Star schema: the stars and the cubes built on them.

use std::sync::Arc;

use crate::rules::ExplicitRuleGroup;

use super::star::LogicalStar;

/// A cube using a star, optionally carrying explicit aggregate rules.
#[derive(Debug, Clone)]
pub struct Cube {
    pub name: String,
    /// Name of the star this cube reads.
    pub star: String,
    pub rules: Option<ExplicitRuleGroup>,
}

impl Cube {
    pub fn new(name: impl Into<String>, star: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            star: star.into(),
            rules: None,
        }
    }

    pub fn with_rules(mut self, rules: ExplicitRuleGroup) -> Self {
        self.rules = Some(rules);
        self
    }
}

/// The logical schema handed to the navigator.
#[derive(Debug, Clone, Default)]
pub struct StarSchema {
    stars: Vec<Arc<LogicalStar>>,
    cubes: Vec<Cube>,
}

impl StarSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_star(mut self, star: LogicalStar) -> Self {
        self.stars.push(Arc::new(star));
        self
    }

    pub fn with_cube(mut self, cube: Cube) -> Self {
        self.cubes.push(cube);
        self
    }

    pub fn stars(&self) -> &[Arc<LogicalStar>] {
        &self.stars
    }

    pub fn star(&self, name: &str) -> Option<&Arc<LogicalStar>> {
        self.stars.iter().find(|s| s.name() == name)
    }

    pub fn cubes(&self) -> &[Cube] {
        &self.cubes
    }

    /// Cubes reading the given star, in schema order.
    pub fn cubes_using<'a>(&'a self, star: &'a LogicalStar) -> impl Iterator<Item = &'a Cube> + 'a {
        self.cubes.iter().filter(move |c| c.star == star.name())
    }
}
