use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::outcome::Outcome;
use crate::record::Record;
use crate::types::{Message, StepId};

/// The value threaded through every step of a single run.
///
/// A state is owned by exactly one run. Steps take it by value and hand it
/// back, so no two runs ever observe the same state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Read-mostly input data (rates, tolerances, defaults).
    pub context: Record,
    /// The record under validation.
    pub subject: Record,
    /// Latest result per step, in first-recorded order.
    pub outcomes: IndexMap<StepId, Outcome>,
    /// One entry per step invocation, repeats included.
    pub trail: Vec<StepId>,
    pub last_passed: bool,
    pub last_failed_step: Option<StepId>,
    pub confidence: f64,
    pub messages: Vec<Message>,
    /// Additional fields written by steps (e.g. `pos_region`).
    #[serde(default)]
    pub vars: Map<String, Value>,
}

impl WorkflowState {
    pub fn new(subject: Record, context: Record) -> Self {
        Self {
            context,
            subject,
            ..Self::default()
        }
    }

    /// Record a step result: store the outcome, derive `last_passed`, and
    /// append the step to the trail.
    ///
    /// `last_failed_step` is left alone; only a pass/fail router classifies
    /// a step as the failure point.
    pub fn record_outcome(&mut self, id: impl Into<StepId>, outcome: impl Into<Outcome>) {
        let id = id.into();
        let outcome = outcome.into();
        self.last_passed = outcome.passed();
        self.outcomes.insert(id.clone(), outcome);
        self.trail.push(id);
    }

    /// By-value form of [`record_outcome`](Self::record_outcome) for steps
    /// written as `state -> state` pipelines.
    pub fn with_outcome(mut self, id: impl Into<StepId>, outcome: impl Into<Outcome>) -> Self {
        self.record_outcome(id, outcome);
        self
    }

    pub fn outcome(&self, id: &str) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    /// The step that ran most recently.
    pub fn last_step(&self) -> Option<&StepId> {
        self.trail.last()
    }

    /// How many times `id` has been invoked in this run.
    pub fn visits(&self, id: &str) -> usize {
        self.trail.iter().filter(|s| s.as_str() == id).count()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn var_str(&self, key: &str) -> Option<&str> {
        self.vars.get(key).and_then(|v| v.as_str())
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    pub fn trail_strings(&self) -> Vec<String> {
        self.trail.iter().map(|s| s.to_string()).collect()
    }
}
