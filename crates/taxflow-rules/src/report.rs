use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use taxflow_core::outcome::Outcome;
use taxflow_core::state::WorkflowState;
use taxflow_core::types::{Message, StepId};

use crate::steps::{INVOICE_COMPARISON, LEGAL_MANDATORY_FIELDS, PLACE_OF_SUPPLY};

/// Caller-facing summary of a finished validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub confidence: f64,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    pub calc_tax: Option<f64>,
    pub supplier_tax: Option<f64>,
    pub rate: Option<f64>,
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_step: Option<String>,
    #[serde(default)]
    pub trail: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub outcomes: IndexMap<StepId, Outcome>,
}

impl ValidationReport {
    /// Summarize a final state. The verdict is the invoice comparison's
    /// result; a run that never reached it did not pass.
    pub fn from_state(state: &WorkflowState) -> Self {
        let comparison = state.outcome(INVOICE_COMPARISON);
        let legal = state.outcome(LEGAL_MANDATORY_FIELDS);
        let pos = state.outcome(PLACE_OF_SUPPLY);

        let missing_fields = legal
            .and_then(|o| o.get("missing"))
            .and_then(|v| v.as_array())
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| f.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            passed: comparison.is_some_and(Outcome::passed),
            confidence: state.confidence,
            missing_fields,
            calc_tax: comparison.and_then(|o| o.get_f64("calc_tax")),
            supplier_tax: comparison.and_then(|o| o.get_f64("supplier_tax")),
            rate: comparison.and_then(|o| o.get_f64("rate")),
            region: pos.and_then(|o| o.get_str("region")).map(str::to_string),
            last_failed_step: state.last_failed_step.as_ref().map(|s| s.to_string()),
            trail: state.trail_strings(),
            messages: state.messages.clone(),
            outcomes: state.outcomes.clone(),
        }
    }

    /// Plain-English summary of the verdict.
    pub fn explain(&self) -> String {
        let pct = (self.confidence * 100.0).round();
        if self.passed {
            return format!(
                "✅ Invoice passed all tax validations with {:.0}% confidence. Calculated tax {} matches supplier tax {}. All mandatory fields present.",
                pct,
                fmt_amount(self.calc_tax),
                fmt_amount(self.supplier_tax)
            );
        }

        let mut msg = format!("⚠️ Invoice failed validation with {:.0}% confidence.", pct);
        if !self.missing_fields.is_empty() {
            msg.push_str(&format!(
                " Missing mandatory fields: {}.",
                self.missing_fields.join(", ")
            ));
        }
        if let (Some(calc), Some(supplier)) = (self.calc_tax, self.supplier_tax) {
            if calc != 0.0 && supplier != 0.0 && calc != supplier {
                msg.push_str(&format!(
                    " Calculated tax ({:.2}) differs from supplier tax ({:.2}).",
                    calc, supplier
                ));
            }
        }
        msg
    }
}

fn fmt_amount(amount: Option<f64>) -> String {
    amount.map_or_else(|| "n/a".to_string(), |a| format!("{:.2}", a))
}
