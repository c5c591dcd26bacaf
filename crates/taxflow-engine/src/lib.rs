pub mod graph;
pub mod remediation;

pub use graph::{
    pass_fail, ControlDirective, Edge, EdgeTable, ExecutionResult, GraphExecutor, PassFailRouter,
    Router, Step, StepOutput, StepRegistry, VarRouter, WorkflowGraph, FAIL, PASS,
};
pub use remediation::RemediationStep;
