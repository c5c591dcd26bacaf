//! Remediation step: the workflow's built-in recovery path.
//!
//! When a gate fails, the pass/fail router marks it as `last_failed_step` and
//! the graph routes here. The step fills the subject fields it knows how to
//! fix for that gate, leaves an audit message, and issues a directive that
//! re-enters the failed gate. It never decides whether the gate now passes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use taxflow_core::outcome::{is_truthy, Outcome};
use taxflow_core::record::Record;
use taxflow_core::state::WorkflowState;
use taxflow_core::types::{Message, StepId};

use crate::graph::{Step, StepOutput};

/// Key in `state.vars` holding per-gate attempt counters.
pub const ATTEMPTS_VAR: &str = "remediation_attempts";

type DefaultsFn = dyn Fn(&Record) -> Record + Send + Sync;

pub struct RemediationStep {
    id: StepId,
    fallback_gate: StepId,
    fields: HashMap<StepId, Vec<String>>,
    builtin_defaults: Arc<DefaultsFn>,
    escalate_after: Option<usize>,
}

impl RemediationStep {
    /// `fallback_gate` is resumed when no failure has been recorded.
    pub fn new(id: impl Into<StepId>, fallback_gate: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            fallback_gate: fallback_gate.into(),
            fields: HashMap::new(),
            builtin_defaults: Arc::new(|_: &Record| Record::new()),
            escalate_after: None,
        }
    }

    /// Allow filling `fields` from defaults when `gate` is the failed step.
    pub fn remediate<I, S>(mut self, gate: impl Into<StepId>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(gate.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Defaults used when `context.defaults` lacks a field. Computed from the
    /// subject so they can depend on it.
    pub fn with_builtin_defaults(
        mut self,
        defaults: impl Fn(&Record) -> Record + Send + Sync + 'static,
    ) -> Self {
        self.builtin_defaults = Arc::new(defaults);
        self
    }

    /// Stop resuming a gate after `attempts` remediations of it.
    pub fn escalate_after(mut self, attempts: Option<usize>) -> Self {
        self.escalate_after = attempts;
        self
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    /// Built-in defaults overlaid with `context.defaults`.
    fn defaults_for(&self, state: &WorkflowState) -> Record {
        let mut defaults = (self.builtin_defaults)(&state.subject);
        if let Some(configured) = state.context.get_record("defaults") {
            defaults.merge(&configured);
        }
        defaults
    }

    fn attempts(state: &WorkflowState, gate: &StepId) -> usize {
        state
            .vars
            .get(ATTEMPTS_VAR)
            .and_then(|v| v.get(gate.as_str()))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize
    }

    fn bump_attempts(state: &mut WorkflowState, gate: &StepId, attempts: usize) {
        let counters = state
            .vars
            .entry(ATTEMPTS_VAR)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(map) = counters.as_object_mut() {
            map.insert(gate.to_string(), json!(attempts));
        }
    }

    fn escalate(&self, mut state: WorkflowState, gate: StepId, attempts: usize) -> StepOutput {
        warn!(step = %self.id, gate = %gate, attempts, "Remediation did not converge, escalating");
        let comment = format!(
            "Escalated after {} remediation attempt(s) at {}.",
            attempts, gate
        );
        state.push_message(Message::system(format!(
            "HITL escalation for {}: needs manual review",
            gate
        )));
        state.record_outcome(
            self.id.clone(),
            Outcome::gate(false, json!({
                "approved": false,
                "escalated": true,
                "comment": comment,
                "changes": {},
            })),
        );
        StepOutput::Next(state)
    }
}

impl Step for RemediationStep {
    fn run(&self, state: WorkflowState) -> StepOutput {
        let mut state = state;
        let gate = state
            .last_failed_step
            .clone()
            .unwrap_or_else(|| self.fallback_gate.clone());
        let attempts = Self::attempts(&state, &gate);

        if self.escalate_after.is_some_and(|limit| attempts >= limit) {
            return self.escalate(state, gate, attempts);
        }

        let defaults = self.defaults_for(&state);
        let mut changes = Map::new();
        if let Some(fields) = self.fields.get(&gate) {
            for field in fields {
                if state.subject.is_present(field) {
                    continue;
                }
                if let Some(value) = defaults.get(field).filter(|v| is_truthy(v)) {
                    state.subject.set(field.clone(), value.clone());
                    changes.insert(field.clone(), value.clone());
                }
            }
        }

        let summary = if changes.is_empty() {
            "no-op".to_string()
        } else {
            Value::Object(changes.clone()).to_string()
        };
        state.push_message(Message::assistant(format!(
            "HITL fixes for {}: {}",
            gate, summary
        )));
        Self::bump_attempts(&mut state, &gate, attempts + 1);

        state.record_outcome(
            self.id.clone(),
            Outcome::data(json!({
                "approved": true,
                "comment": format!("Remediated and resuming from {}.", gate),
                "changes": Value::Object(changes),
            })),
        );

        info!(step = %self.id, gate = %gate, attempt = attempts + 1, changes = %summary, "Remediation resuming failed gate");
        StepOutput::resume(gate, state)
    }
}

impl std::fmt::Debug for RemediationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemediationStep")
            .field("id", &self.id)
            .field("fallback_gate", &self.fallback_gate)
            .field("fields", &self.fields)
            .field("escalate_after", &self.escalate_after)
            .finish()
    }
}
