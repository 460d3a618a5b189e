// Trace Log Backend Trait
//
// Defines the append-only trace log the observability layer writes to.
// The trace graph is expressed as a flat stream of TraceRecords (trace
// started, node created, edge added, ...). Records are never read back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::AgentEvent;
use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, NodeRole, TraceId};

/// Terminal status of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Completed,
    Failed,
}

/// Display configuration of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub description: String,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A single entry in the append-only trace log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A trace was opened (or re-opened; the log treats this idempotently)
    TraceStarted {
        trace_id: TraceId,
        workflow_id: String,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// A node was added to the graph
    NodeCreated {
        trace_id: TraceId,
        node_id: NodeId,
        role: NodeRole,
        config: NodeConfig,
        metadata: serde_json::Map<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },

    /// A directed edge was added between two nodes
    EdgeAdded {
        trace_id: TraceId,
        from: NodeId,
        to: NodeId,
        timestamp: DateTime<Utc>,
    },

    /// The input a node is working on
    NodeInput {
        trace_id: TraceId,
        node_id: NodeId,
        input: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent event observed by a node
    NodeEvent {
        trace_id: TraceId,
        node_id: NodeId,
        event: AgentEvent,
        timestamp: DateTime<Utc>,
    },

    /// A node finished
    NodeCompleted {
        trace_id: TraceId,
        node_id: NodeId,
        result: Option<serde_json::Value>,
        error: Option<String>,
        stream_tokens: u64,
        reasoning_chunks: u64,
        timestamp: DateTime<Utc>,
    },

    /// A trace was ended
    TraceEnded {
        trace_id: TraceId,
        status: TraceStatus,
        timestamp: DateTime<Utc>,
    },
}

impl TraceRecord {
    /// The trace this record belongs to
    pub fn trace_id(&self) -> &TraceId {
        match self {
            Self::TraceStarted { trace_id, .. } => trace_id,
            Self::NodeCreated { trace_id, .. } => trace_id,
            Self::EdgeAdded { trace_id, .. } => trace_id,
            Self::NodeInput { trace_id, .. } => trace_id,
            Self::NodeEvent { trace_id, .. } => trace_id,
            Self::NodeCompleted { trace_id, .. } => trace_id,
            Self::TraceEnded { trace_id, .. } => trace_id,
        }
    }

    /// Record type name, matching the serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TraceStarted { .. } => "trace_started",
            Self::NodeCreated { .. } => "node_created",
            Self::EdgeAdded { .. } => "edge_added",
            Self::NodeInput { .. } => "node_input",
            Self::NodeEvent { .. } => "node_event",
            Self::NodeCompleted { .. } => "node_completed",
            Self::TraceEnded { .. } => "trace_ended",
        }
    }
}

/// Trait for trace log backends
///
/// `append` is synchronous and must not block: it is called from event
/// handlers running on the agent's call stack. Backends buffer records and
/// deliver them on `flush`, one trace at a time: flushing a trace never
/// waits on delivery of another trace's records.
#[async_trait]
pub trait TraceLog: Send + Sync {
    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;

    /// Append a record to the log
    fn append(&self, record: TraceRecord) -> Result<(), ObservabilityError>;

    /// Deliver the buffered records of one trace
    async fn flush(&self, trace_id: &TraceId) -> Result<(), ObservabilityError>;
}

/// Errors that can occur during observability operations
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Conversation id required to address a trace")]
    MissingConversation,

    #[error("Write error: {0}")]
    Write(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_matches_serde_tag() {
        let trace_id = TraceId::for_conversation("c1").unwrap();
        let record = TraceRecord::EdgeAdded {
            trace_id: trace_id.clone(),
            from: NodeId::entry("u1").unwrap(),
            to: NodeId::agent("u1").unwrap(),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], record.kind());
        assert_eq!(value["from"], "ENTRY_u1");
        assert_eq!(value["to"], "AGENT_u1");
        assert_eq!(value["trace_id"], "CONV_c1");
        assert_eq!(record.trace_id(), &trace_id);
    }

    #[test]
    fn test_record_roundtrip_rejects_malformed_node_id() {
        let json = serde_json::json!({
            "type": "edge_added",
            "trace_id": "CONV_c1",
            "from": "BOGUS_u1",
            "to": "AGENT_u1",
            "timestamp": "2025-01-01T00:00:00Z"
        });

        assert!(serde_json::from_value::<TraceRecord>(json).is_err());
    }
}
