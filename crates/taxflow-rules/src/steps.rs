//! Tax compliance checks wired into the validation workflow.
//!
//! Most checks are placeholders that record a pass. The mandatory-field gate,
//! the place-of-supply classifier and the invoice comparison do real work.

use serde_json::json;

use taxflow_core::outcome::Outcome;
use taxflow_core::record::Record;
use taxflow_core::state::WorkflowState;

pub const REPORTING_ENTITY: &str = "1_reporting_entity";
pub const REPORTING_COUNTRY: &str = "2_reporting_country";
pub const LEGAL_MANDATORY_FIELDS: &str = "legal_mandatory_fields";
pub const TAXABILITY_ANALYSIS: &str = "3_taxability_analysis";
pub const PRODUCT_SERVICE_TAXABILITY: &str = "3a_product_service_taxability";
pub const GL_TAXABILITY: &str = "3b_gl_taxability";
pub const SUPPLIER_VAT_VERIFICATION: &str = "4_supplier_vat_verification";
pub const MASTER_DATA: &str = "4a_master_data";
pub const PLACE_OF_SUPPLY: &str = "5_place_of_supply";
pub const REVERSE_CHARGE_VERIFICATION: &str = "5a_reverse_charge_verification";
pub const EU_INTRACOMMUNITY: &str = "5b_eu_intracommunity";
pub const NON_EU_FOREIGN: &str = "5c_non_eu_foreign";
pub const RECOVERABILITY_RATE_BLOCK: &str = "6_recoverability_rate_block";
pub const VAT_RATE_VERIFICATION: &str = "6a_vat_rate_verification";
pub const VAT_RECOVERABILITY: &str = "6b_vat_recoverability";
pub const INVOICE_COMPARISON: &str = "7_invoice_comparison";
pub const FAILED_CONTROLS_HITL: &str = "8_failed_controls_hitl";

/// Fields the mandatory-field gate requires to be present and non-empty.
pub const REQUIRED_FIELDS: [&str; 5] = ["entity_id", "doc_date", "currency", "supplier_id", "net_amount"];

/// Subset of required fields remediation may fill from defaults.
pub const REMEDIABLE_FIELDS: [&str; 4] = ["doc_date", "currency", "supplier_id", "net_amount"];

pub const EU_MEMBER_STATES: [&str; 27] = [
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT", "LV",
    "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

/// `state.vars` key written by the place-of-supply step.
pub const POS_REGION_VAR: &str = "pos_region";

pub const DEFAULT_TOLERANCE: f64 = 0.02;
pub const MATCH_CONFIDENCE: f64 = 0.98;
pub const MISMATCH_CONFIDENCE: f64 = 0.6;

/// A check that always passes.
pub fn stub(id: &'static str) -> impl Fn(WorkflowState) -> WorkflowState + Send + Sync {
    move |state| state.with_outcome(id, true)
}

/// Gate: every field in [`REQUIRED_FIELDS`] must be present.
pub fn legal_mandatory_fields(state: WorkflowState) -> WorkflowState {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !state.subject.is_present(field))
        .collect();
    let outcome = Outcome::gate(missing.is_empty(), json!({ "missing": missing }));
    state.with_outcome(LEGAL_MANDATORY_FIELDS, outcome)
}

/// Place-of-supply classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Domestic,
    Eu,
    NonEu,
}

impl Region {
    pub const LABELS: [&'static str; 3] = ["DOMESTIC", "EU", "NON_EU"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Domestic => "DOMESTIC",
            Self::Eu => "EU",
            Self::NonEu => "NON_EU",
        }
    }

    pub fn classify(ship_to: Option<&str>, supplier: Option<&str>) -> Self {
        let ship_to = ship_to.filter(|s| !s.is_empty());
        let supplier = supplier.filter(|s| !s.is_empty());
        let in_eu = |code: Option<&str>| code.is_some_and(|c| EU_MEMBER_STATES.contains(&c));

        match (ship_to, supplier) {
            (Some(a), Some(b)) if a == b => Self::Domestic,
            (a, b) if in_eu(a) && in_eu(b) => Self::Eu,
            _ => Self::NonEu,
        }
    }
}

/// Classify the supply and store the region for the region router.
pub fn place_of_supply(state: WorkflowState) -> WorkflowState {
    let region = Region::classify(
        state.subject.get_str("ship_to_country"),
        state.subject.get_str("supplier_country"),
    );
    let mut state = state;
    state.set_var(POS_REGION_VAR, json!(region.as_str()));
    state.with_outcome(PLACE_OF_SUPPLY, Outcome::data(json!({ "region": region.as_str() })))
}

/// Rate table used when the context carries none.
pub fn builtin_rate_table() -> Record {
    Record::from_value(json!({ "DE": 0.19 }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Gate: recompute the tax from the net amount and compare it with the
/// supplier's figure within `context.tolerance`. Sets the run's confidence.
pub fn invoice_comparison(state: WorkflowState) -> WorkflowState {
    let mut state = state;
    let rate_table = state
        .context
        .get_record("rate_table")
        .unwrap_or_else(builtin_rate_table);
    let country = ["country", "reporting_country"]
        .into_iter()
        .find(|key| state.subject.is_present(key))
        .and_then(|key| state.subject.get_str(key));
    let rate = country.and_then(|c| rate_table.get_f64(c)).unwrap_or(0.0);

    let net = state.subject.get_f64("net_amount").unwrap_or(0.0);
    let calc_tax = round2(net * rate);
    let supplier_tax = round2(state.subject.get_f64("supplier_tax").unwrap_or(0.0));
    let tolerance = state.context.get_f64("tolerance").unwrap_or(DEFAULT_TOLERANCE);
    let mismatch = (calc_tax - supplier_tax).abs() > tolerance;

    let confidence = if mismatch { MISMATCH_CONFIDENCE } else { MATCH_CONFIDENCE };
    state.confidence = confidence;

    state.with_outcome(
        INVOICE_COMPARISON,
        Outcome::gate(
            !mismatch,
            json!({
                "calc_tax": calc_tax,
                "supplier_tax": supplier_tax,
                "rate": rate,
                "confidence": confidence,
            }),
        ),
    )
}

/// Values remediation falls back to when `context.defaults` lacks a field.
pub fn builtin_defaults(subject: &Record) -> Record {
    let country = subject
        .get_str("country")
        .filter(|c| !c.is_empty())
        .unwrap_or("DE")
        .to_string();
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    Record::from_value(json!({
        "doc_date": today,
        "currency": "EUR",
        "supplier_id": "SIM-SUP",
        "net_amount": 1000.0,
        "supplier_tax": 190.0,
        "ship_to_country": country,
        "supplier_country": country,
    }))
}
