//! Topological sorting of named dependency graphs.

use std::collections::BTreeMap;

use crate::error::GraphError;

/// Node name -> names of the nodes it depends on.
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Sort the graph so that every node comes after its dependencies.
///
/// Uses a depth-first visit with three-color marking. Fails with
/// [`GraphError::CircularDependency`] naming the node at which a cycle was found, or
/// [`GraphError::UnknownDependency`] if an edge points at a node not in the graph.
pub fn topological_sort(graph: &DependencyGraph) -> Result<Vec<String>, GraphError> {
    let mut marks: BTreeMap<&str, Mark> = graph
        .keys()
        .map(|name| (name.as_str(), Mark::Unvisited))
        .collect();
    let mut sorted = Vec::with_capacity(graph.len());

    for name in graph.keys() {
        visit(graph, name, &mut marks, &mut sorted)?;
    }

    Ok(sorted)
}

fn visit<'a>(
    graph: &'a DependencyGraph,
    name: &'a str,
    marks: &mut BTreeMap<&'a str, Mark>,
    sorted: &mut Vec<String>,
) -> Result<(), GraphError> {
    match marks.get(name).copied().unwrap_or(Mark::Unvisited) {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            return Err(GraphError::CircularDependency {
                node: name.to_string(),
            })
        }
        Mark::Unvisited => {}
    }

    marks.insert(name, Mark::InProgress);
    for dependency in graph.get(name).into_iter().flatten() {
        if !graph.contains_key(dependency) {
            return Err(GraphError::UnknownDependency {
                service: name.to_string(),
                dependency: dependency.clone(),
            });
        }
        visit(graph, dependency, marks, sorted)?;
    }
    marks.insert(name, Mark::Done);
    sorted.push(name.to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        edges
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    fn index_of(sorted: &[String], name: &str) -> usize {
        sorted.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_single_node() {
        let sorted = topological_sort(&graph(&[("A", &[])])).unwrap();
        assert_eq!(sorted, vec!["A".to_string()]);
    }

    #[test]
    fn test_dependencies_come_first() {
        let g = graph(&[
            ("api", &["table", "queue"]),
            ("worker", &["queue"]),
            ("queue", &[]),
            ("table", &[]),
        ]);
        let sorted = topological_sort(&g).unwrap();

        assert_eq!(sorted.len(), 4);
        assert!(index_of(&sorted, "table") < index_of(&sorted, "api"));
        assert!(index_of(&sorted, "queue") < index_of(&sorted, "api"));
        assert!(index_of(&sorted, "queue") < index_of(&sorted, "worker"));
    }

    #[test]
    fn test_cycle_detected() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
        let err = topological_sort(&g).unwrap_err();
        assert!(matches!(err, GraphError::CircularDependency { .. }));
        assert!(err.to_string().contains("circular dependencies"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = topological_sort(&graph(&[("A", &["A"])])).unwrap_err();
        assert_eq!(
            err,
            GraphError::CircularDependency {
                node: "A".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let err = topological_sort(&graph(&[("A", &["missing"])])).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownDependency {
                service: "A".to_string(),
                dependency: "missing".to_string()
            }
        );
    }
}
