// Output node reattachment
//
// Appends the assistant's output node to a trace created by an earlier,
// independent invocation. Every node is addressed by its derived id, so no
// state is shared with the invocation that opened the trace:
//
//   MSG_<last message id> -> ENTRY_<user message id>   (continuation, optional)
//   AGENT_<user message id> -> MSG_<assistant message id>

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::backend::{NodeConfig, ObservabilityError, TraceLog};
use crate::config::ObservabilityConfig;
use crate::ids::{NodeId, TraceId};
use crate::logger::TraceLogger;

/// Identifiers of a finished turn whose output should join its trace
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNodeRequest {
    pub conversation_id: String,
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub metadata: Option<Map<String, Value>>,
    /// Output message of the previous turn, linked to this turn's entry
    pub last_message_id: Option<String>,
}

impl OutputNodeRequest {
    pub fn new(
        conversation_id: impl Into<String>,
        user_message_id: impl Into<String>,
        assistant_message_id: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_message_id: user_message_id.into(),
            assistant_message_id: assistant_message_id.into(),
            metadata: None,
            last_message_id: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_last_message_id(mut self, last_message_id: impl Into<String>) -> Self {
        self.last_message_id = Some(last_message_id.into());
        self
    }
}

/// Append the output node for a finished turn to its conversation's trace
///
/// No-op when tracing is disabled or no backend is available. Failures are
/// logged and swallowed.
pub async fn append_output_node(
    request: &OutputNodeRequest,
    config: &ObservabilityConfig,
    backend: Option<&Arc<dyn TraceLog>>,
) {
    if !config.is_active() {
        return;
    }
    let Some(backend) = backend else {
        debug!("No trace log backend available; skipping output node");
        return;
    };

    let trace_id = match TraceId::for_conversation(&request.conversation_id) {
        Ok(trace_id) => trace_id,
        Err(e) => {
            warn!(
                conversation_id = %request.conversation_id,
                error = %e,
                "Cannot address trace; skipping output node"
            );
            return;
        }
    };

    let logger = TraceLogger::attach(Arc::clone(backend), trace_id);
    if let Err(e) = attach_output(request, &logger) {
        warn!(
            conversation_id = %request.conversation_id,
            assistant_message_id = %request.assistant_message_id,
            error = %e,
            "Failed to append output node"
        );
    }

    // Partial attachments are flushed too
    if let Err(e) = logger.flush().await {
        warn!(trace_id = %logger.trace_id(), error = %e, "Failed to flush trace records");
    }
}

fn attach_output(
    request: &OutputNodeRequest,
    logger: &TraceLogger,
) -> Result<(), ObservabilityError> {
    let entry_id = NodeId::entry(&request.user_message_id)?;
    let agent_id = NodeId::agent(&request.user_message_id)?;
    let output_id = NodeId::output(&request.assistant_message_id)?;
    let previous_id = request
        .last_message_id
        .as_deref()
        .map(NodeId::output)
        .transpose()?;

    if let Some(previous_id) = previous_id {
        logger.add_edge(&logger.node(previous_id), &logger.node(entry_id))?;
    }

    let output = logger.add_node(
        output_id,
        NodeConfig::new(
            format!("Message {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
            "Assistant response",
        ),
        request.metadata.clone().unwrap_or_default(),
    )?;

    logger.add_edge(&logger.node(agent_id), &output)
}
