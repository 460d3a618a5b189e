// Trace and node identifiers
//
// Ids are derived from message identifiers, never allocated: the same
// conversation id always yields the same trace id, and the same message id
// always yields the same node id for a given role. Any process holding the
// message ids can therefore address an existing trace graph without a
// lookup. Ids are validated on construction and on parse.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::backend::ObservabilityError;

const TRACE_PREFIX: &str = "CONV_";

/// Role of a node in the per-turn trace graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    /// Request entry point, keyed by the user message id
    Entry,
    /// Agent execution, keyed by the user message id
    Agent,
    /// Final output, keyed by the assistant message id
    Output,
}

impl NodeRole {
    const ALL: [NodeRole; 3] = [NodeRole::Entry, NodeRole::Agent, NodeRole::Output];

    /// Id prefix for this role
    pub const fn prefix(self) -> &'static str {
        match self {
            NodeRole::Entry => "ENTRY_",
            NodeRole::Agent => "AGENT_",
            NodeRole::Output => "MSG_",
        }
    }
}

fn validate_component(kind: &str, value: &str) -> Result<(), ObservabilityError> {
    if value.is_empty() {
        return Err(ObservabilityError::InvalidId(format!("{} is empty", kind)));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ObservabilityError::InvalidId(format!(
            "{} {:?} contains whitespace or control characters",
            kind, value
        )));
    }
    Ok(())
}

// ============================================================================
// TraceId
// ============================================================================

/// Identifier of a conversation's trace: `CONV_<conversation id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId {
    conversation_id: String,
}

impl TraceId {
    /// Derive the trace id for a conversation
    pub fn for_conversation(conversation_id: impl Into<String>) -> Result<Self, ObservabilityError> {
        let conversation_id = conversation_id.into();
        validate_component("conversation id", &conversation_id)?;
        Ok(Self { conversation_id })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", TRACE_PREFIX, self.conversation_id)
    }
}

impl FromStr for TraceId {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let conversation_id = s.strip_prefix(TRACE_PREFIX).ok_or_else(|| {
            ObservabilityError::InvalidId(format!("{:?} is not a trace id", s))
        })?;
        Self::for_conversation(conversation_id)
    }
}

impl TryFrom<String> for TraceId {
    type Error = ObservabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// NodeId
// ============================================================================

/// Identifier of a trace node: role prefix followed by a message id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    role: NodeRole,
    message_id: String,
}

impl NodeId {
    /// Build a node id for `role` keyed by `message_id`
    pub fn new(role: NodeRole, message_id: impl Into<String>) -> Result<Self, ObservabilityError> {
        let message_id = message_id.into();
        validate_component("message id", &message_id)?;
        Ok(Self { role, message_id })
    }

    /// `ENTRY_<user message id>`
    pub fn entry(user_message_id: impl Into<String>) -> Result<Self, ObservabilityError> {
        Self::new(NodeRole::Entry, user_message_id)
    }

    /// `AGENT_<user message id>`
    pub fn agent(user_message_id: impl Into<String>) -> Result<Self, ObservabilityError> {
        Self::new(NodeRole::Agent, user_message_id)
    }

    /// `MSG_<assistant message id>`
    pub fn output(assistant_message_id: impl Into<String>) -> Result<Self, ObservabilityError> {
        Self::new(NodeRole::Output, assistant_message_id)
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.role.prefix(), self.message_id)
    }
}

impl FromStr for NodeId {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeRole::ALL
            .iter()
            .find_map(|role| s.strip_prefix(role.prefix()).map(|rest| (*role, rest)))
            .ok_or_else(|| ObservabilityError::InvalidId(format!("{:?} has no node prefix", s)))
            .and_then(|(role, message_id)| Self::new(role, message_id))
    }
}

impl TryFrom<String> for NodeId {
    type Error = ObservabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_derived_deterministically() {
        let first = (NodeId::entry("u1").unwrap(), NodeId::agent("u1").unwrap());
        let second = (NodeId::entry("u1").unwrap(), NodeId::agent("u1").unwrap());

        assert_eq!(first.0.to_string(), "ENTRY_u1");
        assert_eq!(first.1.to_string(), "AGENT_u1");
        assert_eq!(first.0.to_string().as_bytes(), second.0.to_string().as_bytes());
        assert_eq!(first.1.to_string().as_bytes(), second.1.to_string().as_bytes());
        assert_eq!(NodeId::output("a1").unwrap().to_string(), "MSG_a1");
        assert_eq!(
            TraceId::for_conversation("c1").unwrap().to_string(),
            "CONV_c1"
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        for raw in ["ENTRY_u1", "AGENT_01J0-abc", "MSG_a_b_c"] {
            let id: NodeId = raw.parse().unwrap();
            assert_eq!(id.to_string(), raw);
        }

        let id: NodeId = "MSG_a_b_c".parse().unwrap();
        assert_eq!(id.role(), NodeRole::Output);
        assert_eq!(id.message_id(), "a_b_c");

        let trace: TraceId = "CONV_c1".parse().unwrap();
        assert_eq!(trace.conversation_id(), "c1");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for raw in ["", "ENTRY_", "NODE_u1", "entry_u1", "AGENT_u 1", "MSG_a\nb"] {
            assert!(raw.parse::<NodeId>().is_err(), "{:?} should be rejected", raw);
        }
        for raw in ["", "CONV_", "c1", "CONV_c 1"] {
            assert!(raw.parse::<TraceId>().is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn test_constructors_reject_empty_message_ids() {
        assert!(matches!(
            NodeId::entry(""),
            Err(ObservabilityError::InvalidId(_))
        ));
        assert!(TraceId::for_conversation("").is_err());
    }
}
