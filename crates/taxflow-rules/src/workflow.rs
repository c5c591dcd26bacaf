use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use taxflow_core::config::{AppConfig, RemediationConfig};
use taxflow_core::error::Result;
use taxflow_core::record::Record;
use taxflow_core::state::WorkflowState;
use taxflow_core::types::Target;
use taxflow_engine::{
    EdgeTable, ExecutionResult, GraphExecutor, PassFailRouter, RemediationStep, StepRegistry,
    VarRouter, WorkflowGraph, FAIL, PASS,
};

use crate::report::ValidationReport;
use crate::steps::*;

/// Register every tax check plus the remediation step.
pub fn build_registry(remediation: &RemediationConfig) -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();

    registry.register(REPORTING_ENTITY, stub(REPORTING_ENTITY))?;
    registry.register(REPORTING_COUNTRY, stub(REPORTING_COUNTRY))?;
    registry.register(LEGAL_MANDATORY_FIELDS, legal_mandatory_fields)?;

    registry.register(TAXABILITY_ANALYSIS, stub(TAXABILITY_ANALYSIS))?;
    registry.register(PRODUCT_SERVICE_TAXABILITY, stub(PRODUCT_SERVICE_TAXABILITY))?;
    registry.register(GL_TAXABILITY, stub(GL_TAXABILITY))?;

    registry.register(SUPPLIER_VAT_VERIFICATION, stub(SUPPLIER_VAT_VERIFICATION))?;
    registry.register(MASTER_DATA, stub(MASTER_DATA))?;

    registry.register(PLACE_OF_SUPPLY, place_of_supply)?;
    registry.register(REVERSE_CHARGE_VERIFICATION, stub(REVERSE_CHARGE_VERIFICATION))?;
    registry.register(EU_INTRACOMMUNITY, stub(EU_INTRACOMMUNITY))?;
    registry.register(NON_EU_FOREIGN, stub(NON_EU_FOREIGN))?;

    registry.register(RECOVERABILITY_RATE_BLOCK, stub(RECOVERABILITY_RATE_BLOCK))?;
    registry.register(VAT_RATE_VERIFICATION, stub(VAT_RATE_VERIFICATION))?;
    registry.register(VAT_RECOVERABILITY, stub(VAT_RECOVERABILITY))?;

    registry.register(INVOICE_COMPARISON, invoice_comparison)?;
    registry.register(FAILED_CONTROLS_HITL, remediation_step(remediation))?;

    Ok(registry)
}

pub fn remediation_step(config: &RemediationConfig) -> RemediationStep {
    RemediationStep::new(FAILED_CONTROLS_HITL, LEGAL_MANDATORY_FIELDS)
        .remediate(LEGAL_MANDATORY_FIELDS, REMEDIABLE_FIELDS)
        .with_builtin_defaults(builtin_defaults)
        .escalate_after(config.escalate_after)
}

/// Wire the checks: gates route `fail` into remediation, which jumps back by
/// directive. Its static edge to `DONE` is only taken on escalation.
pub fn build_edges() -> EdgeTable {
    let gate = |pass: Target| [(PASS, pass), (FAIL, Target::from(FAILED_CONTROLS_HITL))];

    let mut edges = EdgeTable::new();
    edges
        .set_entry(REPORTING_ENTITY)
        .add_edge(REPORTING_ENTITY, REPORTING_COUNTRY)
        .add_conditional(REPORTING_COUNTRY, PassFailRouter, gate(LEGAL_MANDATORY_FIELDS.into()))
        .add_conditional(LEGAL_MANDATORY_FIELDS, PassFailRouter, gate(TAXABILITY_ANALYSIS.into()))
        .add_edge(TAXABILITY_ANALYSIS, PRODUCT_SERVICE_TAXABILITY)
        .add_edge(PRODUCT_SERVICE_TAXABILITY, GL_TAXABILITY)
        .add_edge(GL_TAXABILITY, SUPPLIER_VAT_VERIFICATION)
        .add_conditional(SUPPLIER_VAT_VERIFICATION, PassFailRouter, gate(MASTER_DATA.into()))
        .add_edge(MASTER_DATA, PLACE_OF_SUPPLY)
        .add_conditional(
            PLACE_OF_SUPPLY,
            VarRouter::new(POS_REGION_VAR, Region::Domestic.as_str()),
            [
                (Region::Domestic.as_str(), REVERSE_CHARGE_VERIFICATION),
                (Region::Eu.as_str(), EU_INTRACOMMUNITY),
                (Region::NonEu.as_str(), NON_EU_FOREIGN),
            ],
        )
        .add_edge(REVERSE_CHARGE_VERIFICATION, RECOVERABILITY_RATE_BLOCK)
        .add_edge(EU_INTRACOMMUNITY, RECOVERABILITY_RATE_BLOCK)
        .add_edge(NON_EU_FOREIGN, RECOVERABILITY_RATE_BLOCK)
        .add_edge(RECOVERABILITY_RATE_BLOCK, VAT_RATE_VERIFICATION)
        .add_edge(VAT_RATE_VERIFICATION, VAT_RECOVERABILITY)
        .add_edge(VAT_RECOVERABILITY, INVOICE_COMPARISON)
        .add_conditional(INVOICE_COMPARISON, PassFailRouter, gate(Target::Done))
        .add_edge(FAILED_CONTROLS_HITL, Target::Done);
    edges
}

pub fn build_graph(remediation: &RemediationConfig) -> Result<WorkflowGraph> {
    WorkflowGraph::build(build_registry(remediation)?, build_edges())
}

/// Runs the tax workflow for individual transactions.
///
/// Cheap to clone: the graph is shared, so clones can validate concurrently.
#[derive(Debug, Clone)]
pub struct TaxValidator {
    executor: GraphExecutor,
    config: Arc<AppConfig>,
}

impl TaxValidator {
    pub fn new(config: AppConfig) -> Result<Self> {
        let graph = build_graph(&config.remediation)?.shared();
        let max_steps = config.engine.max_steps_for(graph.step_count());
        let executor = GraphExecutor::new(graph).with_max_steps(max_steps);
        debug!(max_steps, "Tax workflow ready");
        Ok(Self {
            executor,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn graph(&self) -> &Arc<WorkflowGraph> {
        self.executor.graph()
    }

    /// Run the workflow and return the raw execution result.
    pub fn execute(&self, subject: Record, context: Record) -> Result<ExecutionResult> {
        let context = self.config.validation.context_for(&context);
        self.executor.run(WorkflowState::new(subject, context))
    }

    /// Run the workflow and summarize the final state.
    pub fn validate(&self, subject: Record, context: Record) -> Result<ValidationReport> {
        let result = self.execute(subject, context)?;
        Ok(ValidationReport::from_state(&result.state))
    }

    pub fn validate_value(&self, subject: Value, context: Option<Value>) -> Result<ValidationReport> {
        self.validate(
            Record::from_value(subject),
            context.map(Record::from_value).unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_builds() {
        let graph = build_graph(&RemediationConfig::default()).unwrap();
        assert_eq!(graph.step_count(), 17);
        assert_eq!(graph.entry(), REPORTING_ENTITY);
    }

    #[test]
    fn test_every_gate_routes_failures_to_remediation() {
        let graph = build_graph(&RemediationConfig::default()).unwrap();
        let lines = graph.describe();
        for gate in [REPORTING_COUNTRY, LEGAL_MANDATORY_FIELDS, SUPPLIER_VAT_VERIFICATION, INVOICE_COMPARISON] {
            let line = lines.iter().find(|l| l.starts_with(gate)).unwrap();
            assert!(line.contains("fail: 8_failed_controls_hitl"), "{line}");
        }
    }

    #[test]
    fn test_default_step_budget() {
        let validator = TaxValidator::new(AppConfig::default()).unwrap();
        assert_eq!(validator.executor.max_steps(), 170);
    }
}
