// Trace logger and node handles
//
// TraceLogger addresses one trace in the append-only log and writes graph
// records to it. NodeHandle addresses one node; handles can be created
// fresh (writing a node record) or reconstructed from an id alone (writing
// nothing), which is what lets a later invocation attach edges to nodes it
// never created.
//
// A NodeHandle is also an EventHandler, so the agent node can be registered
// as a live sink for the turn's events.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use parley_core::{AgentEvent, EventHandler, HandlerError, HandlerResult};
use serde_json::{Map, Value};

use crate::backend::{NodeConfig, ObservabilityError, TraceLog, TraceRecord, TraceStatus};
use crate::ids::{NodeId, TraceId};

/// Writer for a single trace
#[derive(Clone)]
pub struct TraceLogger {
    trace_id: TraceId,
    log: Arc<dyn TraceLog>,
}

impl std::fmt::Debug for TraceLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLogger")
            .field("trace_id", &self.trace_id)
            .field("backend", &self.log.name())
            .finish()
    }
}

impl TraceLogger {
    /// Open the trace, or attach to it if it already exists in the log
    pub fn open(
        log: Arc<dyn TraceLog>,
        trace_id: TraceId,
        workflow_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, ObservabilityError> {
        let logger = Self::attach(log, trace_id);
        logger.log.append(TraceRecord::TraceStarted {
            trace_id: logger.trace_id.clone(),
            workflow_id: workflow_id.into(),
            title: title.into(),
            timestamp: Utc::now(),
        })?;
        Ok(logger)
    }

    /// Address an existing trace without writing anything
    pub fn attach(log: Arc<dyn TraceLog>, trace_id: TraceId) -> Self {
        Self { trace_id, log }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    /// Create a node
    pub fn add_node(
        &self,
        id: NodeId,
        config: NodeConfig,
        metadata: Map<String, Value>,
    ) -> Result<NodeHandle, ObservabilityError> {
        self.log.append(TraceRecord::NodeCreated {
            trace_id: self.trace_id.clone(),
            role: id.role(),
            node_id: id.clone(),
            config,
            metadata,
            timestamp: Utc::now(),
        })?;
        Ok(self.node(id))
    }

    /// Reconstruct a handle to a node created elsewhere
    pub fn node(&self, id: NodeId) -> NodeHandle {
        NodeHandle {
            id,
            logger: self.clone(),
            activity: Mutex::new(NodeActivity::default()),
        }
    }

    /// Record a directed edge
    pub fn add_edge(&self, from: &NodeHandle, to: &NodeHandle) -> Result<(), ObservabilityError> {
        self.log.append(TraceRecord::EdgeAdded {
            trace_id: self.trace_id.clone(),
            from: from.id.clone(),
            to: to.id.clone(),
            timestamp: Utc::now(),
        })
    }

    /// End the trace with a status
    pub fn end(&self, status: TraceStatus) -> Result<(), ObservabilityError> {
        self.log.append(TraceRecord::TraceEnded {
            trace_id: self.trace_id.clone(),
            status,
            timestamp: Utc::now(),
        })
    }

    /// Deliver this trace's buffered records
    pub async fn flush(&self) -> Result<(), ObservabilityError> {
        self.log.flush(&self.trace_id).await
    }

    fn append(&self, record: TraceRecord) -> Result<(), ObservabilityError> {
        self.log.append(record)
    }
}

#[derive(Debug, Default)]
struct NodeActivity {
    stream_tokens: u64,
    reasoning_chunks: u64,
}

/// Handle to a node in a trace
#[derive(Debug)]
pub struct NodeHandle {
    id: NodeId,
    logger: TraceLogger,
    activity: Mutex<NodeActivity>,
}

impl NodeHandle {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Record the input the node is working on
    pub fn set_input(&self, input: impl Into<String>) -> Result<(), ObservabilityError> {
        self.logger.append(TraceRecord::NodeInput {
            trace_id: self.logger.trace_id.clone(),
            node_id: self.id.clone(),
            input: input.into(),
            timestamp: Utc::now(),
        })
    }

    /// Mark the node complete, with an optional error
    pub fn complete(
        &self,
        result: Option<Value>,
        error: Option<&str>,
    ) -> Result<(), ObservabilityError> {
        let (stream_tokens, reasoning_chunks) = {
            let activity = self.activity.lock().unwrap_or_else(PoisonError::into_inner);
            (activity.stream_tokens, activity.reasoning_chunks)
        };

        self.logger.append(TraceRecord::NodeCompleted {
            trace_id: self.logger.trace_id.clone(),
            node_id: self.id.clone(),
            result,
            error: error.map(str::to_string),
            stream_tokens,
            reasoning_chunks,
            timestamp: Utc::now(),
        })
    }
}

impl EventHandler for NodeHandle {
    fn on_event(&self, event: &AgentEvent) -> HandlerResult {
        match event {
            AgentEvent::StreamToken { .. } => {
                self.activity
                    .lock()
                    .map_err(|_| HandlerError::new("node activity lock poisoned"))?
                    .stream_tokens += 1;
                Ok(())
            }
            AgentEvent::ReasoningChunk { .. } => {
                self.activity
                    .lock()
                    .map_err(|_| HandlerError::new("node activity lock poisoned"))?
                    .reasoning_chunks += 1;
                Ok(())
            }
            AgentEvent::Message { .. } | AgentEvent::ToolResult { .. } => self
                .logger
                .append(TraceRecord::NodeEvent {
                    trace_id: self.logger.trace_id.clone(),
                    node_id: self.id.clone(),
                    event: event.clone(),
                    timestamp: Utc::now(),
                })
                .map_err(|e| HandlerError::new(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "TraceNode"
    }
}
