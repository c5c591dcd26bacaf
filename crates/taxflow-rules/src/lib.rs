//! Tax compliance validation built on the Taxflow workflow engine.

pub mod batch;
pub mod report;
pub mod steps;
pub mod workflow;

pub use batch::{validate_batch, BatchEntry, BatchItem, BatchReport, BatchRequest};
pub use report::ValidationReport;
pub use workflow::{build_edges, build_graph, build_registry, TaxValidator};
