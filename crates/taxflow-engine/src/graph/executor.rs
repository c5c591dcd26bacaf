use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use taxflow_core::error::{Result, TaxflowError};
use taxflow_core::state::WorkflowState;
use taxflow_core::types::{RunId, StepId, Target};

use super::compile::WorkflowGraph;
use super::registry::StepOutput;

/// Result of executing a graph to `DONE`.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// The final state handed back to the caller.
    pub state: WorkflowState,
    /// Number of step invocations (equals `state.trail.len()`).
    pub invocations: usize,
    /// Number of directive-driven jumps taken.
    pub redirects: usize,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
}

enum Cursor {
    Entry,
    At(StepId),
    Done,
}

/// Drives one run through a [`WorkflowGraph`].
///
/// Starting from `ENTRY`, it invokes the current step, follows a directive if
/// the step issued one, and otherwise resolves the step's outgoing edge. The
/// run ends at `DONE`, or fails once more than `max_steps` invocations would
/// be needed.
#[derive(Debug, Clone)]
pub struct GraphExecutor {
    graph: Arc<WorkflowGraph>,
    max_steps: usize,
}

impl GraphExecutor {
    /// Create an executor with the default cap of ten invocations per
    /// registered step.
    pub fn new(graph: Arc<WorkflowGraph>) -> Self {
        let max_steps = 10 * graph.step_count().max(1);
        Self { graph, max_steps }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn graph(&self) -> &Arc<WorkflowGraph> {
        &self.graph
    }

    /// Execute the graph on `state` until `DONE`.
    pub fn run(&self, state: WorkflowState) -> Result<ExecutionResult> {
        let start = Instant::now();
        let run_id = RunId::new();
        let mut state = state;
        let mut cursor = Cursor::Entry;
        let mut invocations = 0usize;
        let mut redirects = 0usize;

        info!(run_id = %run_id, entry = %self.graph.entry(), max_steps = self.max_steps, "Starting workflow run");

        loop {
            let current = match cursor {
                Cursor::Entry => {
                    cursor = Cursor::At(self.graph.entry().clone());
                    continue;
                }
                Cursor::Done => break,
                Cursor::At(id) => id,
            };

            if invocations >= self.max_steps {
                warn!(
                    run_id = %run_id,
                    step = %current,
                    max_steps = self.max_steps,
                    "Step budget exhausted, aborting run"
                );
                return Err(TaxflowError::CycleExceeded {
                    max_steps: self.max_steps,
                    trail: state.trail_strings(),
                });
            }

            let step = self.graph.step(current.as_str()).ok_or_else(|| TaxflowError::Routing {
                step: current.to_string(),
                reason: "no step registered under this id".to_string(),
                trail: state.trail_strings(),
            })?;

            let trail_before = state.trail.len();
            let output = step.run(state);
            invocations += 1;

            match output {
                StepOutput::Redirect(directive) => {
                    check_contract(&current, trail_before, &directive.state_override)?;
                    if !self.graph.contains(directive.resume_at.as_str()) {
                        return Err(TaxflowError::Routing {
                            step: current.to_string(),
                            reason: format!(
                                "directive resumes at unregistered step '{}'",
                                directive.resume_at
                            ),
                            trail: directive.state_override.trail_strings(),
                        });
                    }
                    redirects += 1;
                    info!(
                        run_id = %run_id,
                        from = %current,
                        resume_at = %directive.resume_at,
                        "Step issued a resume directive"
                    );
                    state = directive.state_override;
                    cursor = Cursor::At(directive.resume_at);
                }
                StepOutput::Next(next_state) => {
                    check_contract(&current, trail_before, &next_state)?;
                    state = next_state;

                    let edge = self.graph.edge(current.as_str()).ok_or_else(|| {
                        TaxflowError::Routing {
                            step: current.to_string(),
                            reason: "step has no outgoing edge and issued no directive"
                                .to_string(),
                            trail: state.trail_strings(),
                        }
                    })?;
                    let target = edge.resolve(&current, &mut state)?;

                    debug!(
                        run_id = %run_id,
                        step = %current,
                        passed = state.last_passed,
                        next = %target,
                        "Step complete"
                    );

                    cursor = match target {
                        Target::Step(id) => Cursor::At(id),
                        Target::Done => Cursor::Done,
                    };
                }
            }
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            invocations,
            redirects,
            total_elapsed_ms,
            "Workflow run reached DONE"
        );

        Ok(ExecutionResult {
            run_id,
            state,
            invocations,
            redirects,
            total_elapsed_ms,
        })
    }
}

/// A step must append exactly its own id to the trail.
fn check_contract(step: &StepId, trail_before: usize, state: &WorkflowState) -> Result<()> {
    if state.trail.len() == trail_before + 1 && state.trail.last() == Some(step) {
        return Ok(());
    }
    Err(TaxflowError::StepContract {
        step: step.to_string(),
        message: format!(
            "expected trail to grow from {} to {} ending in '{}', got {} entries ending in {:?}",
            trail_before,
            trail_before + 1,
            step,
            state.trail.len(),
            state.trail.last().map(|s| s.as_str())
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeTable;
    use crate::graph::registry::StepRegistry;
    use crate::graph::router::PassFailRouter;

    fn pass(id: &'static str) -> impl Fn(WorkflowState) -> WorkflowState + Send + Sync {
        move |state| state.with_outcome(id, true)
    }

    fn linear_graph() -> Arc<WorkflowGraph> {
        let mut registry = StepRegistry::new();
        registry.register("a", pass("a")).unwrap();
        registry.register("b", pass("b")).unwrap();
        let mut edges = EdgeTable::new();
        edges.set_entry("a").add_edge("a", "b").add_edge("b", Target::Done);
        WorkflowGraph::build(registry, edges).unwrap().shared()
    }

    #[test]
    fn test_linear_run_reaches_done() {
        let result = GraphExecutor::new(linear_graph())
            .run(WorkflowState::default())
            .unwrap();
        assert_eq!(result.state.trail_strings(), vec!["a", "b"]);
        assert_eq!(result.invocations, 2);
        assert_eq!(result.redirects, 0);
    }

    #[test]
    fn test_default_max_steps_scales_with_graph() {
        assert_eq!(GraphExecutor::new(linear_graph()).max_steps(), 20);
        assert_eq!(
            GraphExecutor::new(linear_graph()).with_max_steps(5).max_steps(),
            5
        );
    }

    #[test]
    fn test_gate_failure_routes_to_fail_branch() {
        let mut registry = StepRegistry::new();
        registry
            .register("gate", |state: WorkflowState| state.with_outcome("gate", false))
            .unwrap();
        registry.register("handler", pass("handler")).unwrap();
        let mut edges = EdgeTable::new();
        edges
            .set_entry("gate")
            .add_conditional("gate", PassFailRouter, [("pass", Target::Done), ("fail", Target::from("handler"))])
            .add_edge("handler", Target::Done);
        let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

        let result = GraphExecutor::new(graph).run(WorkflowState::default()).unwrap();
        assert_eq!(result.state.trail_strings(), vec!["gate", "handler"]);
        assert_eq!(result.state.last_failed_step, Some(StepId::from("gate")));
    }

    #[test]
    fn test_dead_end_step_is_routing_error() {
        let mut registry = StepRegistry::new();
        registry.register("a", pass("a")).unwrap();
        let mut edges = EdgeTable::new();
        edges.set_entry("a");
        let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

        let err = GraphExecutor::new(graph).run(WorkflowState::default()).unwrap_err();
        assert!(matches!(err, TaxflowError::Routing { ref step, .. } if step == "a"));
    }

    #[test]
    fn test_step_that_skips_trail_breaks_contract() {
        let mut registry = StepRegistry::new();
        registry.register("silent", |state: WorkflowState| state).unwrap();
        let mut edges = EdgeTable::new();
        edges.set_entry("silent").add_edge("silent", Target::Done);
        let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

        let err = GraphExecutor::new(graph).run(WorkflowState::default()).unwrap_err();
        assert!(matches!(err, TaxflowError::StepContract { .. }));
    }

    #[test]
    fn test_directive_to_unknown_step_is_routing_error() {
        let mut registry = StepRegistry::new();
        registry
            .register("jump", |state: WorkflowState| {
                StepOutput::resume("nowhere", state.with_outcome("jump", true))
            })
            .unwrap();
        let mut edges = EdgeTable::new();
        edges.set_entry("jump");
        let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

        let err = GraphExecutor::new(graph).run(WorkflowState::default()).unwrap_err();
        match err {
            TaxflowError::Routing { reason, trail, .. } => {
                assert!(reason.contains("'nowhere'"));
                assert_eq!(trail, vec!["jump".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directive_skips_edges() {
        let mut registry = StepRegistry::new();
        registry
            .register("start", |state: WorkflowState| {
                let first = state.visits("start") == 0;
                let state = state.with_outcome("start", true);
                if first {
                    StepOutput::resume("start", state)
                } else {
                    StepOutput::Next(state)
                }
            })
            .unwrap();
        registry.register("never", pass("never")).unwrap();
        let mut edges = EdgeTable::new();
        edges.set_entry("start").add_edge("start", Target::Done).add_edge("never", Target::Done);
        let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

        let result = GraphExecutor::new(graph).run(WorkflowState::default()).unwrap();
        assert_eq!(result.state.trail_strings(), vec!["start", "start"]);
        assert_eq!(result.redirects, 1);
    }
}
