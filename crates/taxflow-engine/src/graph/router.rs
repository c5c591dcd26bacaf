use taxflow_core::outcome::Outcome;
use taxflow_core::state::WorkflowState;

use super::edge::Router;

pub const PASS: &str = "pass";
pub const FAIL: &str = "fail";

/// Classify the step that just ran as passed or failed.
///
/// Looks at `trail[-1]`, or the most recently inserted outcome when the trail
/// is empty, and derives pass/fail the same way the merge helper does. A
/// failure marks that step as `last_failed_step`; a pass of the step currently
/// marked clears the mark.
pub fn pass_fail(state: &mut WorkflowState) -> &'static str {
    let last = state
        .trail
        .last()
        .cloned()
        .or_else(|| state.outcomes.keys().last().cloned());

    let passed = last
        .as_ref()
        .and_then(|id| state.outcomes.get(id))
        .is_some_and(Outcome::passed);

    if let Some(id) = last {
        if !passed {
            state.last_failed_step = Some(id);
        } else if state.last_failed_step.as_ref() == Some(&id) {
            state.last_failed_step = None;
        }
    }

    if passed {
        PASS
    } else {
        FAIL
    }
}

/// Reusable gate router with the `pass`/`fail` label set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassFailRouter;

impl Router for PassFailRouter {
    fn route(&self, state: &mut WorkflowState) -> String {
        pass_fail(state).to_string()
    }

    fn name(&self) -> &str {
        "pass_fail"
    }
}

/// Routes on a string field of `state.vars`, with a label used when the
/// field is absent.
#[derive(Debug, Clone)]
pub struct VarRouter {
    key: String,
    default: String,
}

impl VarRouter {
    pub fn new(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default: default.into(),
        }
    }
}

impl Router for VarRouter {
    fn route(&self, state: &mut WorkflowState) -> String {
        state
            .var_str(&self.key)
            .unwrap_or(&self.default)
            .to_string()
    }

    fn name(&self) -> &str {
        &self.key
    }
}
