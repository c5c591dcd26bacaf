use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::outcome::{as_number, is_truthy};

/// Open field map used for both the run context and the subject under
/// validation.
///
/// Keys are strings; values are JSON so callers can pass arbitrary payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    data: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a Record from initial data.
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Create a Record from a JSON value. Non-object values yield an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(data) => Self { data },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value as a string, if it's a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Get a value as a number, accepting numeric strings.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(as_number)
    }

    /// Get a nested object as a Record.
    pub fn get_record(&self, key: &str) -> Option<Record> {
        self.data
            .get(key)
            .and_then(|v| v.as_object())
            .map(|m| Record::from_map(m.clone()))
    }

    /// Whether the field exists with a truthy value.
    pub fn is_present(&self, key: &str) -> bool {
        self.data.get(key).is_some_and(is_truthy)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Merge another record into this one (overwrites on conflict).
    pub fn merge(&mut self, other: &Record) {
        for (k, v) in &other.data {
            self.data.insert(k.clone(), v.clone());
        }
    }

    /// Merge `other` underneath this record: only keys missing here are taken.
    pub fn merge_missing(&mut self, other: &Record) {
        for (k, v) in &other.data {
            if !self.data.contains_key(k) {
                self.data.insert(k.clone(), v.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}
