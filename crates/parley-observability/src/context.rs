// Trace context for one chat turn
//
// A TraceContext is either active (a logger plus the turn's agent node) or
// inactive and inert. Creating a context wires the entry and agent nodes
// into the conversation's trace:
//
//   CONV_<conversation id>
//     ENTRY_<user message id> -> AGENT_<user message id>
//
// The public functions here are the observability boundary: every failure
// is logged and degrades to an inactive context or a no-op, never an error.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::backend::{NodeConfig, ObservabilityError, TraceLog, TraceStatus};
use crate::config::ObservabilityConfig;
use crate::ids::{NodeId, TraceId};
use crate::logger::{NodeHandle, TraceLogger};

/// Identifiers of the turn a trace context is created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    pub workflow_id: String,
    pub title: String,
    pub user_message_id: String,
    pub bot_id: Option<String>,
    pub conversation_id: Option<String>,
}

impl TraceRequest {
    pub fn new(
        workflow_id: impl Into<String>,
        title: impl Into<String>,
        user_message_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            title: title.into(),
            user_message_id: user_message_id.into(),
            bot_id: None,
            conversation_id: None,
        }
    }

    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Trace handles for one turn
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    logger: Option<TraceLogger>,
    agent_node: Option<Arc<NodeHandle>>,
}

impl TraceContext {
    /// A context that records nothing
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.logger.is_some() && self.agent_node.is_some()
    }

    pub fn logger(&self) -> Option<&TraceLogger> {
        self.logger.as_ref()
    }

    pub fn agent_node(&self) -> Option<&Arc<NodeHandle>> {
        self.agent_node.as_ref()
    }

    /// Seed the agent node with the input it works on; best effort
    pub fn record_input(&self, input: &str) {
        let Some(node) = &self.agent_node else {
            return;
        };
        if let Err(e) = node.set_input(input) {
            warn!(node = %node.id(), error = %e, "Failed to record agent node input");
        }
    }
}

/// Create the trace context for a turn
///
/// Returns an inactive context when tracing is disabled, the configuration
/// is invalid, no backend is available, or any trace write fails. Records
/// written before a failure are flushed with the trace.
pub async fn create_trace_context(
    request: &TraceRequest,
    config: &ObservabilityConfig,
    backend: Option<&Arc<dyn TraceLog>>,
) -> TraceContext {
    if !config.is_active() {
        return TraceContext::inactive();
    }
    let Some(backend) = backend else {
        debug!("No trace log backend available; tracing disabled for this turn");
        return TraceContext::inactive();
    };

    let trace_id = match request
        .conversation_id
        .as_deref()
        .ok_or(ObservabilityError::MissingConversation)
        .and_then(TraceId::for_conversation)
    {
        Ok(trace_id) => trace_id,
        Err(e) => {
            warn!(
                backend = backend.name(),
                user_message_id = %request.user_message_id,
                error = %e,
                "Cannot address trace; continuing without tracing"
            );
            return TraceContext::inactive();
        }
    };

    match build_context(request, backend, trace_id.clone()) {
        Ok(context) => context,
        Err(e) => {
            warn!(
                backend = backend.name(),
                user_message_id = %request.user_message_id,
                error = %e,
                "Failed to create trace context; continuing without tracing"
            );
            if let Err(e) = backend.flush(&trace_id).await {
                warn!(trace_id = %trace_id, error = %e, "Failed to flush trace records");
            }
            TraceContext::inactive()
        }
    }
}

fn build_context(
    request: &TraceRequest,
    backend: &Arc<dyn TraceLog>,
    trace_id: TraceId,
) -> Result<TraceContext, ObservabilityError> {
    let conversation_id = trace_id.conversation_id().to_string();
    let entry_id = NodeId::entry(&request.user_message_id)?;
    let agent_id = NodeId::agent(&request.user_message_id)?;

    let logger = TraceLogger::open(
        Arc::clone(backend),
        trace_id,
        &request.workflow_id,
        &request.title,
    )?;

    let now = Utc::now().format("%Y-%m-%d %H:%M:%S");

    let entry = logger.add_node(
        entry_id,
        NodeConfig::new(format!("Entry {}", now), "Chat request received"),
        object(json!({
            "bot_id": request.bot_id,
            "conversation_id": conversation_id,
        })),
    )?;

    let agent = logger.add_node(
        agent_id,
        NodeConfig::new(format!("Agent {}", now), "Agent execution for the turn"),
        object(json!({ "workflow_id": request.workflow_id })),
    )?;

    logger.add_edge(&entry, &agent)?;

    Ok(TraceContext {
        logger: Some(logger),
        agent_node: Some(Arc::new(agent)),
    })
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Complete the turn's trace: finish the agent node, end the trace, flush
///
/// No-op for an inactive context.
pub async fn complete_trace_context(
    context: &TraceContext,
    result: Option<Value>,
    status: TraceStatus,
    error: Option<&str>,
) {
    let (Some(logger), Some(agent)) = (&context.logger, &context.agent_node) else {
        return;
    };

    let finished = agent
        .complete(result, error)
        .and_then(|()| logger.end(status));
    if let Err(e) = finished {
        warn!(trace_id = %logger.trace_id(), error = %e, "Failed to complete trace");
    }

    if let Err(e) = logger.flush().await {
        warn!(trace_id = %logger.trace_id(), error = %e, "Failed to flush trace records");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TraceRecord;
    use crate::memory::InMemoryTraceLog;

    fn request() -> TraceRequest {
        TraceRequest::new("chat_m", "Chat: m", "u1")
            .with_bot_id("b1")
            .with_conversation_id("c1")
    }

    fn backend(log: &InMemoryTraceLog) -> Arc<dyn TraceLog> {
        Arc::new(log.clone())
    }

    #[tokio::test]
    async fn test_active_context_wires_entry_and_agent() {
        let log = InMemoryTraceLog::new();
        let config = ObservabilityConfig::for_stream("arn", "s1");

        let context = create_trace_context(&request(), &config, Some(&backend(&log))).await;

        assert!(context.is_active());
        assert_eq!(log.nodes(), vec!["ENTRY_u1", "AGENT_u1"]);
        assert_eq!(
            log.edges(),
            vec![("ENTRY_u1".to_string(), "AGENT_u1".to_string())]
        );
        assert!(log
            .records()
            .iter()
            .all(|r| r.trace_id().to_string() == "CONV_c1"));

        match &log.records()[1] {
            TraceRecord::NodeCreated { metadata, .. } => {
                assert_eq!(metadata["bot_id"], "b1");
                assert_eq!(metadata["conversation_id"], "c1");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disabled_config_makes_no_calls() {
        let log = InMemoryTraceLog::new();
        let context = create_trace_context(
            &request(),
            &ObservabilityConfig::disabled(),
            Some(&backend(&log)),
        )
        .await;

        assert!(!context.is_active());
        assert_eq!(log.append_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_inactive() {
        let log = InMemoryTraceLog::new();
        let config = ObservabilityConfig::for_stream("arn", "");

        let context = create_trace_context(&request(), &config, Some(&backend(&log))).await;

        assert!(!context.is_active());
        assert_eq!(log.append_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_backend_or_conversation_is_inactive() {
        let config = ObservabilityConfig::for_stream("arn", "s1");
        assert!(!create_trace_context(&request(), &config, None)
            .await
            .is_active());

        let log = InMemoryTraceLog::new();
        let request = TraceRequest::new("chat_m", "Chat: m", "u1");
        let context = create_trace_context(&request, &config, Some(&backend(&log))).await;
        assert!(!context.is_active());
        assert_eq!(log.append_calls(), 0);
        assert_eq!(log.flush_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_degrades_to_inactive_and_flushes_partial_trace() {
        let log = InMemoryTraceLog::new().failing_on("edge_added");
        let config = ObservabilityConfig::for_stream("arn", "s1");

        let context = create_trace_context(&request(), &config, Some(&backend(&log))).await;

        assert!(!context.is_active());
        assert_eq!(log.nodes(), vec!["ENTRY_u1", "AGENT_u1"]);
        assert_eq!(
            log.flushed_traces(),
            vec![TraceId::for_conversation("c1").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_complete_ends_trace_and_flushes() {
        let log = InMemoryTraceLog::new();
        let config = ObservabilityConfig::for_stream("arn", "s1");
        let context = create_trace_context(&request(), &config, Some(&backend(&log))).await;

        context.record_input("hello");
        complete_trace_context(&context, None, TraceStatus::Failed, Some("boom")).await;

        let kinds: Vec<_> = log.records().iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "trace_started",
                "node_created",
                "node_created",
                "edge_added",
                "node_input",
                "node_completed",
                "trace_ended",
            ]
        );
        assert!(matches!(
            log.records().last(),
            Some(TraceRecord::TraceEnded {
                status: TraceStatus::Failed,
                ..
            })
        ));
        assert_eq!(log.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_complete_swallows_failures() {
        let log = InMemoryTraceLog::new().failing_flush();
        let config = ObservabilityConfig::for_stream("arn", "s1");
        let context = create_trace_context(&request(), &config, Some(&backend(&log))).await;

        complete_trace_context(&context, None, TraceStatus::Completed, None).await;
        complete_trace_context(&TraceContext::inactive(), None, TraceStatus::Completed, None)
            .await;
    }
}
