pub mod config;
pub mod error;
pub mod outcome;
pub mod record;
pub mod state;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, TaxflowError};
pub use outcome::{Detail, Outcome};
pub use record::Record;
pub use state::WorkflowState;
pub use types::*;
