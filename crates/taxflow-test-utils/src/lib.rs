//! Fixtures and scripted graphs shared by Taxflow tests.

use std::io::Write;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::NamedTempFile;

use taxflow_core::record::Record;
use taxflow_core::state::WorkflowState;
use taxflow_core::types::Target;
use taxflow_engine::{EdgeTable, PassFailRouter, RemediationStep, StepRegistry, WorkflowGraph};

/// Invoice with every mandatory field, taxed at the German standard rate.
pub fn complete_subject() -> Value {
    json!({
        "entity_id": "DE01",
        "country": "DE",
        "net_amount": 1000,
        "supplier_tax": 190,
        "ship_to_country": "DE",
        "supplier_country": "DE",
        "doc_date": "2025-10-13",
        "currency": "EUR",
        "supplier_id": "S1",
    })
}

/// Invoice missing `doc_date`, `currency`, `supplier_id` and `net_amount`.
pub fn incomplete_subject() -> Value {
    json!({
        "id": "TX999",
        "entity_id": "DE01",
        "country": "DE",
        "ship_to_country": "DE",
        "supplier_country": "DE",
        "supplier_tax": 190.0,
    })
}

/// Complete invoice whose supplier tax disagrees with the computed tax.
pub fn mismatched_subject() -> Value {
    let mut subject = complete_subject();
    subject["supplier_tax"] = json!(150);
    subject
}

/// Context with the German rate and a one-cent tolerance.
pub fn german_context() -> Value {
    json!({
        "rate_table": {"DE": 0.19},
        "tolerance": 0.01,
    })
}

/// [`german_context`] plus remediation defaults for the net amount and tax.
pub fn remediation_context() -> Value {
    let mut ctx = german_context();
    ctx["defaults"] = json!({"net_amount": 1000.0, "supplier_tax": 190.0});
    ctx
}

pub fn state(subject: Value, context: Value) -> WorkflowState {
    WorkflowState::new(Record::from_value(subject), Record::from_value(context))
}

pub const LOOP_GATE: &str = "gate";
pub const LOOP_FIX: &str = "fix";

/// A graph whose gate always fails and whose remediation always resumes the
/// gate without fixing anything. Only the step budget can end it.
pub fn never_converging_graph() -> Arc<WorkflowGraph> {
    let mut registry = StepRegistry::new();
    registry
        .register(LOOP_GATE, |state: WorkflowState| state.with_outcome(LOOP_GATE, false))
        .expect("register gate");
    registry
        .register(LOOP_FIX, RemediationStep::new(LOOP_FIX, LOOP_GATE))
        .expect("register fix");

    let mut edges = EdgeTable::new();
    edges.set_entry(LOOP_GATE).add_conditional(
        LOOP_GATE,
        PassFailRouter,
        [("pass", Target::Done), ("fail", Target::from(LOOP_FIX))],
    );
    WorkflowGraph::build(registry, edges)
        .expect("loop graph is valid")
        .shared()
}

/// Write `contents` to a temporary TOML file.
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp file");
    tmp.write_all(contents.as_bytes()).expect("write toml");
    tmp
}
