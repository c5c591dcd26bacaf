use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of a step in a workflow graph.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an edge leads: another step, or the terminal `DONE` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Step(StepId),
    Done,
}

impl Target {
    pub fn step(id: impl Into<StepId>) -> Self {
        Self::Step(id.into())
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::Step(StepId::from(s))
    }
}

impl From<StepId> for Target {
    fn from(id: StepId) -> Self {
        Self::Step(id)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(id) => write!(f, "{}", id),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Unique identifier for a single workflow run, used to correlate log lines.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Author of an audit message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Assistant,
}

/// A human-readable audit entry appended during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Engine-authored note, such as an escalation.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_id_compares_with_str() {
        let id = StepId::from("legal_mandatory_fields");
        assert_eq!(id, "legal_mandatory_fields");
        assert_eq!(id.to_string(), "legal_mandatory_fields");
    }

    #[test]
    fn test_step_id_serializes_transparently() {
        let json = serde_json::to_string(&StepId::from("7_invoice_comparison")).unwrap();
        assert_eq!(json, r#""7_invoice_comparison""#);
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::from("a").to_string(), "a");
        assert_eq!(Target::Done.to_string(), "DONE");
    }

    #[test]
    fn test_message_role_lowercase() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
