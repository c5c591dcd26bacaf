use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use taxflow_core::record::Record;

use crate::report::ValidationReport;
use crate::workflow::TaxValidator;

/// One transaction to validate, with its optional per-item context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(alias = "tx")]
    pub subject: Record,
    #[serde(default, alias = "ctx")]
    pub context: Record,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub items: Vec<BatchItem>,
}

/// Per-item result: a report, or the error that aborted the run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn passed(&self) -> bool {
        self.report.as_ref().is_some_and(|r| r.passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<BatchEntry>,
    pub passed_count: usize,
    pub failed_count: usize,
}

/// Validate every item as an independent run.
///
/// Runs are synchronous, so each goes to the blocking pool; they share the
/// validator's graph read-only. Results keep the input order. Errored runs
/// count as failed.
pub async fn validate_batch(validator: &TaxValidator, items: Vec<BatchItem>) -> BatchReport {
    let total = items.len();
    let handles = items.into_iter().map(|item| {
        let validator = validator.clone();
        tokio::task::spawn_blocking(move || validator.validate(item.subject, item.context))
    });

    let results: Vec<BatchEntry> = join_all(handles)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, joined)| match joined {
            Ok(Ok(report)) => BatchEntry {
                index,
                report: Some(report),
                error: None,
            },
            Ok(Err(e)) => {
                warn!(index, error = %e, "Batch item aborted");
                BatchEntry {
                    index,
                    report: None,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                warn!(index, error = %e, "Batch item task failed");
                BatchEntry {
                    index,
                    report: None,
                    error: Some(format!("task failed: {}", e)),
                }
            }
        })
        .collect();

    let passed_count = results.iter().filter(|r| r.passed()).count();
    info!(total, passed_count, "Batch validation complete");

    BatchReport {
        failed_count: results.len() - passed_count,
        passed_count,
        results,
    }
}
