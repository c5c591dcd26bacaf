use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaxflowError {
    // Graph definition errors (build time)
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Run-time routing errors
    #[error("Routing error at step '{step}': {reason}")]
    Routing {
        step: String,
        reason: String,
        trail: Vec<String>,
    },

    #[error("Run exceeded max steps ({max_steps}) after trail: {}", trail.join(" -> "))]
    CycleExceeded {
        max_steps: usize,
        trail: Vec<String>,
    },

    #[error("Step '{step}' broke the step contract: {message}")]
    StepContract { step: String, message: String },

    // Config file errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaxflowError {
    /// Trail recorded up to the failure, for errors raised mid-run.
    pub fn trail(&self) -> Option<&[String]> {
        match self {
            Self::Routing { trail, .. } | Self::CycleExceeded { trail, .. } => Some(trail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TaxflowError>;
