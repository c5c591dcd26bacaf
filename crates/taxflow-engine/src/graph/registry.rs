use std::collections::HashMap;
use std::sync::Arc;

use taxflow_core::error::{Result, TaxflowError};
use taxflow_core::state::WorkflowState;
use taxflow_core::types::StepId;

/// An explicit instruction from a step to resume at `resume_at` instead of
/// following the graph's edges.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDirective {
    pub resume_at: StepId,
    pub state_override: WorkflowState,
}

/// What a step hands back to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    /// Follow the step's outgoing edge with this state.
    Next(WorkflowState),
    /// Skip edge resolution and jump to the directive's step.
    Redirect(ControlDirective),
}

impl StepOutput {
    pub fn resume(resume_at: impl Into<StepId>, state: WorkflowState) -> Self {
        Self::Redirect(ControlDirective {
            resume_at: resume_at.into(),
            state_override: state,
        })
    }

    pub fn state(&self) -> &WorkflowState {
        match self {
            Self::Next(state) => state,
            Self::Redirect(directive) => &directive.state_override,
        }
    }

    pub fn directive(&self) -> Option<&ControlDirective> {
        match self {
            Self::Next(_) => None,
            Self::Redirect(directive) => Some(directive),
        }
    }
}

impl From<WorkflowState> for StepOutput {
    fn from(state: WorkflowState) -> Self {
        Self::Next(state)
    }
}

/// A named unit of work in a workflow graph.
///
/// Steps are total and synchronous: they take the run's state by value and
/// return it, optionally with a directive. Implementations must record their
/// own outcome (appending exactly their id to the trail).
pub trait Step: Send + Sync {
    fn run(&self, state: WorkflowState) -> StepOutput;
}

impl<F, O> Step for F
where
    F: Fn(WorkflowState) -> O + Send + Sync,
    O: Into<StepOutput>,
{
    fn run(&self, state: WorkflowState) -> StepOutput {
        self(state).into()
    }
}

/// Registry of the steps available to a graph.
#[derive(Default)]
pub struct StepRegistry {
    steps: HashMap<StepId, Arc<dyn Step>>,
    order: Vec<StepId>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step. Ids must be unique.
    pub fn register(&mut self, id: impl Into<StepId>, step: impl Step + 'static) -> Result<()> {
        let id = id.into();
        if self.steps.contains_key(&id) {
            return Err(TaxflowError::Configuration(format!(
                "step '{}' is already registered",
                id
            )));
        }
        self.order.push(id.clone());
        self.steps.insert(id, Arc::new(step));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.steps.contains_key(id)
    }

    /// Step ids in registration order.
    pub fn ids(&self) -> &[StepId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry").field("steps", &self.order).finish()
    }
}
