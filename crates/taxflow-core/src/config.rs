use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TaxflowError};
use crate::record::Record;

/// Top-level Taxflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub remediation: RemediationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on step invocations per run. When unset the cap is
    /// `max_steps_factor` times the number of registered steps.
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default = "default_max_steps_factor")]
    pub max_steps_factor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            max_steps_factor: default_max_steps_factor(),
        }
    }
}

impl EngineConfig {
    /// Resolve the step cap for a graph with `step_count` registered steps.
    pub fn max_steps_for(&self, step_count: usize) -> usize {
        self.max_steps
            .unwrap_or_else(|| self.max_steps_factor.max(1).saturating_mul(step_count.max(1)))
    }
}

fn default_max_steps_factor() -> usize { 10 }

/// Reference data seeded into every run's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Allowed absolute difference between computed and supplier tax.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Tax rate per country/region code.
    #[serde(default)]
    pub rate_table: BTreeMap<String, f64>,
    /// Field values the remediation step may fill in.
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            rate_table: BTreeMap::new(),
            defaults: Map::new(),
        }
    }
}

pub fn default_tolerance() -> f64 { 0.02 }

impl ValidationConfig {
    /// Build the base context for a run. Empty tables are left out so the
    /// steps fall back to their built-in data.
    pub fn base_context(&self) -> Record {
        let mut ctx = Record::new();
        ctx.set("tolerance", Value::from(self.tolerance));
        if !self.rate_table.is_empty() {
            let table: Map<String, Value> = self
                .rate_table
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect();
            ctx.set("rate_table", Value::Object(table));
        }
        if !self.defaults.is_empty() {
            ctx.set("defaults", Value::Object(self.defaults.clone()));
        }
        ctx
    }

    /// Caller context layered over the configured base context.
    pub fn context_for(&self, caller: &Record) -> Record {
        let mut ctx = caller.clone();
        ctx.merge_missing(&self.base_context());
        ctx
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemediationConfig {
    /// Stop resuming a gate after this many remediation attempts and end the
    /// run with the failing verdict. Unset means always resume.
    #[serde(default)]
    pub escalate_after: Option<usize>,
}

impl AppConfig {
    /// Load config from a TOML file, expanding `${ENV_VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| TaxflowError::ConfigNotFound(path.display().to_string()))?;

        let expanded = expand_env_vars(&content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| TaxflowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.validation.tolerance >= 0.0) {
            return Err(TaxflowError::Config(format!(
                "validation.tolerance must be non-negative, got {}",
                self.validation.tolerance
            )));
        }
        if self.engine.max_steps == Some(0) {
            return Err(TaxflowError::Config(
                "engine.max_steps must be greater than zero".to_string(),
            ));
        }
        if let Some((code, rate)) = self
            .validation
            .rate_table
            .iter()
            .find(|(_, r)| !(0.0..=1.0).contains(*r))
        {
            return Err(TaxflowError::Config(format!(
                "validation.rate_table.{} must be within [0, 1], got {}",
                code, rate
            )));
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_steps, None);
        assert_eq!(config.engine.max_steps_factor, 10);
        assert_eq!(config.validation.tolerance, 0.02);
        assert!(config.validation.rate_table.is_empty());
        assert!(config.remediation.escalate_after.is_none());
    }

    #[test]
    fn test_max_steps_for() {
        let engine = EngineConfig::default();
        assert_eq!(engine.max_steps_for(17), 170);

        let engine = EngineConfig {
            max_steps: Some(40),
            ..EngineConfig::default()
        };
        assert_eq!(engine.max_steps_for(17), 40);
    }

    #[test]
    fn test_base_context_omits_empty_tables() {
        let ctx = ValidationConfig::default().base_context();
        assert_eq!(ctx.get_f64("tolerance"), Some(0.02));
        assert!(ctx.get("rate_table").is_none());
        assert!(ctx.get("defaults").is_none());
    }

    #[test]
    fn test_caller_context_overrides_config() {
        let toml_str = r#"
[validation]
tolerance = 0.05

[validation.rate_table]
DE = 0.19
ES = 0.21
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let caller = Record::from_value(serde_json::json!({"tolerance": 0.01}));
        let ctx = config.validation.context_for(&caller);

        assert_eq!(ctx.get_f64("tolerance"), Some(0.01));
        let rates = ctx.get_record("rate_table").unwrap();
        assert_eq!(rates.get_f64("ES"), Some(0.21));
    }

    #[test]
    fn test_defaults_table_accepts_mixed_values() {
        let toml_str = r#"
[validation.defaults]
currency = "EUR"
net_amount = 1000.0
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.validation.defaults["currency"], "EUR");
        assert_eq!(config.validation.defaults["net_amount"], 1000.0);
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown() {
        assert_eq!(
            expand_env_vars("x = \"${TAXFLOW_SURELY_UNSET_VAR}\""),
            "x = \"${TAXFLOW_SURELY_UNSET_VAR}\""
        );
    }

    #[test]
    fn test_validate_rejects_bad_rate() {
        let config: AppConfig = toml::from_str("[validation.rate_table]\nDE = 19.0\n").unwrap();
        assert!(config.validate().is_err());
    }
}
