//! Workflow graph engine.
//!
//! A workflow is a directed graph of named `Step`s. Edges are either static
//! or conditional (a `Router` picks a label, the label picks the target).
//! A step may also bypass its edges by returning a `ControlDirective`, which
//! is how remediation loops back to a failed gate.
//!
//! Graphs are validated once by `WorkflowGraph::build` and then shared
//! read-only; `GraphExecutor` drives a single run from `ENTRY` to `DONE`.

pub mod compile;
pub mod edge;
pub mod executor;
pub mod registry;
pub mod router;

pub use compile::WorkflowGraph;
pub use edge::{Edge, EdgeTable, Router};
pub use executor::{ExecutionResult, GraphExecutor};
pub use registry::{ControlDirective, Step, StepOutput, StepRegistry};
pub use router::{pass_fail, PassFailRouter, VarRouter, FAIL, PASS};
