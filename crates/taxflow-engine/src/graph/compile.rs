use std::collections::HashMap;
use std::sync::Arc;

use taxflow_core::error::{Result, TaxflowError};
use taxflow_core::types::{StepId, Target};

use super::edge::{Edge, EdgeTable};
use super::registry::{Step, StepRegistry};

/// A validated, immutable workflow graph.
///
/// Built once from a [`StepRegistry`] and an [`EdgeTable`]; afterwards it is
/// read-only and can be shared across any number of concurrent runs.
#[derive(Debug)]
pub struct WorkflowGraph {
    registry: StepRegistry,
    edges: HashMap<StepId, Edge>,
    entry: StepId,
}

impl WorkflowGraph {
    /// Validate and freeze a graph definition.
    ///
    /// Every edge source and target must be a registered step (or `DONE`),
    /// each step has at most one outgoing edge, and an entry step must be
    /// designated. All problems are reported together.
    pub fn build(registry: StepRegistry, edges: EdgeTable) -> Result<Self> {
        let mut problems = edges.problems.clone();

        let entry = match &edges.entry {
            Some(entry) if registry.contains(entry.as_str()) => Some(entry.clone()),
            Some(entry) => {
                problems.push(format!("entry step '{}' is not registered", entry));
                None
            }
            None => {
                problems.push("no entry step designated".to_string());
                None
            }
        };

        for from in &edges.order {
            if !registry.contains(from.as_str()) {
                problems.push(format!("edge source '{}' is not registered", from));
            }
            let edge = &edges.edges[from];
            if let Edge::Conditional { routes, .. } = edge {
                if routes.is_empty() {
                    problems.push(format!("conditional edge from '{}' has no routes", from));
                }
            }
            for target in edge.targets() {
                if let Target::Step(to) = target {
                    if !registry.contains(to.as_str()) {
                        problems.push(format!(
                            "edge '{}' -> '{}' targets an unregistered step",
                            from, to
                        ));
                    }
                }
            }
        }

        match entry {
            Some(entry) if problems.is_empty() => Ok(Self {
                registry,
                edges: edges.edges,
                entry,
            }),
            _ => Err(TaxflowError::Configuration(problems.join("; "))),
        }
    }

    /// Wrap in an `Arc` for sharing across runs.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn entry(&self) -> &StepId {
        &self.entry
    }

    pub fn step(&self, id: &str) -> Option<Arc<dyn Step>> {
        self.registry.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(id)
    }

    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from)
    }

    pub fn step_count(&self) -> usize {
        self.registry.len()
    }

    /// One line per step describing its outgoing transition.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!("ENTRY -> {}", self.entry)];
        for id in self.registry.ids() {
            let line = match self.edges.get(id.as_str()) {
                Some(Edge::Static(target)) => format!("{} -> {}", id, target),
                Some(Edge::Conditional { router, routes }) => {
                    let routes = routes
                        .iter()
                        .map(|(label, target)| format!("{}: {}", label, target))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("{} ={}=> {{{}}}", id, router.name(), routes)
                }
                None => format!("{} -> (directive only)", id),
            };
            lines.push(line);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::router::PassFailRouter;
    use taxflow_core::state::WorkflowState;

    fn registry(ids: &[&str]) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for id in ids {
            let name = id.to_string();
            registry
                .register(*id, move |state: WorkflowState| state.with_outcome(name.as_str(), true))
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_build_valid_graph() {
        let mut edges = EdgeTable::new();
        edges
            .set_entry("a")
            .add_edge("a", "b")
            .add_conditional("b", PassFailRouter, [("pass", Target::Done), ("fail", Target::from("a"))]);

        let graph = WorkflowGraph::build(registry(&["a", "b"]), edges).unwrap();
        assert_eq!(graph.entry(), "a");
        assert_eq!(graph.step_count(), 2);
        assert!(graph.edge("a").is_some());
    }

    #[test]
    fn test_missing_entry_is_configuration_error() {
        let mut edges = EdgeTable::new();
        edges.add_edge("a", Target::Done);
        let err = WorkflowGraph::build(registry(&["a"]), edges).unwrap_err();
        assert!(matches!(err, TaxflowError::Configuration(msg) if msg.contains("no entry")));
    }

    #[test]
    fn test_unresolved_target_is_configuration_error() {
        let mut edges = EdgeTable::new();
        edges.set_entry("a").add_edge("a", "ghost");
        let err = WorkflowGraph::build(registry(&["a"]), edges).unwrap_err();
        assert!(matches!(err, TaxflowError::Configuration(msg) if msg.contains("'ghost'")));
    }

    #[test]
    fn test_unregistered_source_is_configuration_error() {
        let mut edges = EdgeTable::new();
        edges.set_entry("a").add_edge("a", Target::Done).add_edge("ghost", "a");
        let err = WorkflowGraph::build(registry(&["a"]), edges).unwrap_err();
        assert!(matches!(err, TaxflowError::Configuration(msg) if msg.contains("source 'ghost'")));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut edges = EdgeTable::new();
        edges
            .set_entry("nope")
            .add_edge("a", "x")
            .add_edge("a", "y");
        let err = WorkflowGraph::build(registry(&["a"]), edges).unwrap_err();
        let TaxflowError::Configuration(msg) = err else {
            panic!("expected configuration error");
        };
        assert!(msg.contains("more than one outgoing edge"));
        assert!(msg.contains("entry step 'nope'"));
        assert!(msg.contains("'x'"));
    }

    #[test]
    fn test_second_entry_is_rejected() {
        let mut edges = EdgeTable::new();
        edges
            .set_entry("a")
            .set_entry("b")
            .add_edge("a", Target::Done)
            .add_edge("b", Target::Done);
        let err = WorkflowGraph::build(registry(&["a", "b"]), edges).unwrap_err();
        let TaxflowError::Configuration(msg) = err else {
            panic!("expected configuration error");
        };
        assert!(msg.contains("entry already set to 'a', got 'b'"));
    }

    #[test]
    fn test_describe_lists_every_step() {
        let mut edges = EdgeTable::new();
        edges
            .set_entry("a")
            .add_conditional("a", PassFailRouter, [("pass", Target::Done), ("fail", Target::from("b"))]);
        let graph = WorkflowGraph::build(registry(&["a", "b"]), edges).unwrap();
        let lines = graph.describe();
        assert_eq!(lines[0], "ENTRY -> a");
        assert_eq!(lines[1], "a =pass_fail=> {fail: b, pass: DONE}");
        assert_eq!(lines[2], "b -> (directive only)");
    }
}
