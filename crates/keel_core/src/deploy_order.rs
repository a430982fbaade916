//! Deploy order calculation.
//!
//! Services are grouped into levels. Every dependency of a service in level `n` lies in
//! a level below `n`, so all services of one level can be processed concurrently.

use std::collections::BTreeSet;

use tracing::debug;

use crate::context::EnvironmentContext;
use crate::error::GraphError;
use crate::graph::{topological_sort, DependencyGraph};

/// Ordered levels of service names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeployOrder {
    levels: Vec<Vec<String>>,
}

impl DeployOrder {
    /// Compute the deploy order of an environment.
    pub fn for_environment(environment: &EnvironmentContext) -> Result<Self, GraphError> {
        let order = Self::from_graph(&environment.dependency_graph())?;
        debug!(
            "Deploy order for environment '{}': {:?}",
            environment.environment_name, order.levels
        );
        Ok(order)
    }

    /// Compute levels for a dependency graph.
    ///
    /// Level 0 holds the nodes without dependencies; each following level holds the
    /// unplaced nodes whose dependencies are all placed. Names within a level are
    /// sorted.
    pub fn from_graph(graph: &DependencyGraph) -> Result<Self, GraphError> {
        topological_sort(graph)?;

        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut levels = Vec::new();

        while placed.len() < graph.len() {
            let level: Vec<String> = graph
                .iter()
                .filter(|(name, _)| !placed.contains(name.as_str()))
                .filter(|(_, deps)| deps.iter().all(|d| placed.contains(d.as_str())))
                .map(|(name, _)| name.clone())
                .collect();

            // Unreachable once the graph is known to be acyclic with no unknown edges.
            if level.is_empty() {
                let node = graph
                    .keys()
                    .find(|name| !placed.contains(name.as_str()))
                    .cloned()
                    .unwrap_or_default();
                return Err(GraphError::CircularDependency { node });
            }

            for name in &level {
                if let Some((key, _)) = graph.get_key_value(name) {
                    placed.insert(key.as_str());
                }
            }
            levels.push(level);
        }

        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&[String]> {
        self.levels.get(index).map(|l| l.as_slice())
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Index of the level holding `service`.
    pub fn level_of(&self, service: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|s| s == service))
    }
}
