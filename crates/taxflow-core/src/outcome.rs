use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Result payload recorded by a step.
///
/// A step reports either a bare gate (`Bool`) or a structured result
/// (`Detailed`). Both shapes go through [`Outcome::passed`], which is the only
/// place pass/fail is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Bool(bool),
    Detailed(Detail),
}

/// Structured step result with an optional explicit `passed` flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    /// A `passed` key that is present but null counts as a failure.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_flag"
    )]
    pub passed: Option<bool>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Outcome {
    /// Structured result carrying an explicit pass/fail flag.
    pub fn gate(passed: bool, data: Value) -> Self {
        Self::Detailed(Detail {
            passed: Some(passed),
            data: into_map(data),
        })
    }

    /// Structured result without a flag; pass/fail falls back to truthiness.
    /// A scalar or array payload is stored under `value` and keeps its own
    /// truthiness as the flag.
    pub fn data(data: Value) -> Self {
        let passed = match &data {
            Value::Object(_) | Value::Null => None,
            other => Some(is_truthy(other)),
        };
        Self::Detailed(Detail {
            passed,
            data: into_map(data),
        })
    }

    /// Derive pass/fail: the explicit flag when present, otherwise the
    /// truthiness of the payload itself.
    pub fn passed(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Detailed(detail) => match detail.passed {
                Some(p) => p,
                None => !detail.data.is_empty(),
            },
        }
    }

    /// Look up a field of a structured result.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Bool(_) => None,
            Self::Detailed(detail) => detail.data.get(key),
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(as_number)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }
}

impl From<bool> for Outcome {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn present_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(Option::<bool>::deserialize(deserializer)?.unwrap_or(false)))
}

/// Truthiness of a JSON value: `null`, `false`, zero, and empty strings,
/// arrays, or objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Read a number from a JSON value, accepting numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
