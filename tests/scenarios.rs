use serde_json::json;

use taxflow_core::config::{AppConfig, RemediationConfig};
use taxflow_core::error::TaxflowError;
use taxflow_core::record::Record;
use taxflow_core::state::WorkflowState;
use taxflow_core::types::Target;
use taxflow_engine::{EdgeTable, GraphExecutor, StepRegistry, VarRouter, WorkflowGraph};
use taxflow_rules::steps::{FAILED_CONTROLS_HITL, INVOICE_COMPARISON, LEGAL_MANDATORY_FIELDS};
use taxflow_rules::TaxValidator;
use taxflow_test_utils::{
    complete_subject, german_context, incomplete_subject, mismatched_subject,
    never_converging_graph, remediation_context, state, LOOP_FIX, LOOP_GATE,
};

fn validator() -> TaxValidator {
    TaxValidator::new(AppConfig::default()).expect("tax graph builds")
}

fn assert_trail_invariant(state: &WorkflowState) {
    let last = state.trail.last().expect("trail is never empty");
    assert!(state.outcomes.contains_key(last), "no outcome for {last}");
}

#[test]
fn test_complete_invoice_passes() {
    let result = validator()
        .execute(
            Record::from_value(complete_subject()),
            Record::from_value(german_context()),
        )
        .unwrap();
    assert_trail_invariant(&result.state);
    assert_eq!(result.redirects, 0);
    assert_eq!(result.invocations, result.state.trail.len());

    let report = taxflow_rules::ValidationReport::from_state(&result.state);
    assert!(report.passed);
    assert_eq!(report.calc_tax, Some(190.0));
    assert_eq!(report.confidence, 0.98);
    assert!(report.missing_fields.is_empty());
    assert_eq!(report.region.as_deref(), Some("DOMESTIC"));
    assert_eq!(report.trail.last().map(String::as_str), Some(INVOICE_COMPARISON));
    assert!(!report.trail.iter().any(|s| s == FAILED_CONTROLS_HITL));
}

#[test]
fn test_missing_fields_are_remediated() {
    let result = validator()
        .execute(
            Record::from_value(incomplete_subject()),
            Record::from_value(remediation_context()),
        )
        .unwrap();
    let final_state = &result.state;
    assert_trail_invariant(final_state);
    assert_eq!(final_state.visits(LEGAL_MANDATORY_FIELDS), 2);
    assert_eq!(final_state.visits(FAILED_CONTROLS_HITL), 1);
    assert_eq!(result.redirects, 1);

    // The resumed gate follows the remediation step directly.
    let trail = final_state.trail_strings();
    let hitl = trail.iter().position(|s| s == FAILED_CONTROLS_HITL).unwrap();
    assert_eq!(trail[hitl + 1], LEGAL_MANDATORY_FIELDS);
    assert!(trail[..hitl].iter().any(|s| s == LEGAL_MANDATORY_FIELDS));

    assert_eq!(final_state.subject.get_f64("net_amount"), Some(1000.0));
    assert_eq!(final_state.subject.get_str("currency"), Some("EUR"));
    assert!(final_state.subject.is_present("doc_date"));
    assert!(final_state.subject.is_present("supplier_id"));
    assert!(final_state.last_failed_step.is_none());

    let report = taxflow_rules::ValidationReport::from_state(final_state);
    assert!(report.passed);
    assert_eq!(report.calc_tax, Some(190.0));
    assert!(report
        .messages
        .iter()
        .any(|m| m.content.starts_with("HITL fixes for legal_mandatory_fields")));
}

#[test]
fn test_tax_mismatch_exhausts_step_budget() {
    let err = validator()
        .validate(
            Record::from_value(mismatched_subject()),
            Record::from_value(german_context()),
        )
        .unwrap_err();

    match err {
        TaxflowError::CycleExceeded { max_steps, ref trail } => {
            assert_eq!(max_steps, 170);
            assert_eq!(trail.len(), 170);
            assert!(trail.iter().any(|s| s == FAILED_CONTROLS_HITL));
        }
        other => panic!("expected CycleExceeded, got {other}"),
    }
}

#[test]
fn test_tax_mismatch_escalates_when_configured() {
    let config = AppConfig {
        remediation: RemediationConfig {
            escalate_after: Some(2),
        },
        ..AppConfig::default()
    };
    let validator = TaxValidator::new(config).unwrap();
    let result = validator
        .execute(
            Record::from_value(mismatched_subject()),
            Record::from_value(german_context()),
        )
        .unwrap();
    assert_trail_invariant(&result.state);
    assert_eq!(result.state.visits(INVOICE_COMPARISON), 3);
    assert_eq!(result.state.visits(FAILED_CONTROLS_HITL), 3);
    assert_eq!(
        result.state.last_step().map(|s| s.as_str()),
        Some(FAILED_CONTROLS_HITL)
    );

    let report = taxflow_rules::ValidationReport::from_state(&result.state);
    assert!(!report.passed);
    assert_eq!(report.confidence, 0.6);
    assert_eq!(report.last_failed_step.as_deref(), Some(INVOICE_COMPARISON));
    assert_eq!(report.supplier_tax, Some(150.0));
    assert!(report.explain().contains("differs from supplier tax (150.00)"));
    assert_eq!(
        report.outcomes[FAILED_CONTROLS_HITL].get("escalated"),
        Some(&json!(true))
    );
}

#[test]
fn test_unmapped_label_is_routing_error() {
    let mut registry = StepRegistry::new();
    registry
        .register("classify", |mut state: WorkflowState| {
            state.set_var("kind", json!("unknown"));
            state.with_outcome("classify", true)
        })
        .unwrap();
    registry
        .register("known", |state: WorkflowState| state.with_outcome("known", true))
        .unwrap();

    let mut edges = EdgeTable::new();
    edges
        .set_entry("classify")
        .add_conditional("classify", VarRouter::new("kind", "known"), [("known", "known")])
        .add_edge("known", Target::Done);
    let graph = WorkflowGraph::build(registry, edges).unwrap().shared();

    let err = GraphExecutor::new(graph)
        .run(WorkflowState::default())
        .unwrap_err();
    match err {
        TaxflowError::Routing { ref step, ref trail, .. } => {
            assert_eq!(step, "classify");
            assert_eq!(trail.last().map(String::as_str), Some("classify"));
        }
        other => panic!("expected Routing, got {other}"),
    }
}

#[test]
fn test_guard_stops_never_converging_loop() {
    let executor = GraphExecutor::new(never_converging_graph()).with_max_steps(12);
    let err = executor.run(state(json!({}), json!({}))).unwrap_err();

    assert!(matches!(err, TaxflowError::CycleExceeded { max_steps: 12, .. }));
    let trail = err.trail().unwrap();
    assert!(trail.len() <= 12);
    // Every remediation is followed by the gate it resumed.
    for pair in trail.windows(2) {
        if pair[0] == LOOP_FIX {
            assert_eq!(pair[1], LOOP_GATE);
        }
    }
}

#[test]
fn test_runs_are_independent() {
    let validator = validator();
    let first = validator
        .execute(
            Record::from_value(incomplete_subject()),
            Record::from_value(remediation_context()),
        )
        .unwrap();
    let second = validator
        .execute(
            Record::from_value(complete_subject()),
            Record::from_value(german_context()),
        )
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert!(second.state.messages.is_empty());
    assert_eq!(second.state.visits(LEGAL_MANDATORY_FIELDS), 1);
}
