// Agent events
//
// AgentEvent is the single payload type the agent execution capability
// emits into the turn's callback while it runs. Every sink receives the
// same event; each sink picks out the variants it cares about.

use serde::{Deserialize, Serialize};

use crate::message::{AgentMessage, ToolResultStatus};

/// Events emitted during agent execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Incremental text output
    StreamToken { data: String },

    /// Incremental reasoning output
    ReasoningChunk { text: String },

    /// A complete message was appended to the agent's history
    Message { message: AgentMessage },

    /// A tool finished executing
    ToolResult {
        tool_use_id: String,
        name: String,
        status: ToolResultStatus,
        content: Vec<serde_json::Value>,
    },
}

impl AgentEvent {
    /// Create a stream token event
    pub fn stream_token(data: impl Into<String>) -> Self {
        AgentEvent::StreamToken { data: data.into() }
    }

    /// Create a reasoning chunk event
    pub fn reasoning(text: impl Into<String>) -> Self {
        AgentEvent::ReasoningChunk { text: text.into() }
    }

    /// Create a full message event
    pub fn message(message: AgentMessage) -> Self {
        AgentEvent::Message { message }
    }

    /// Create a tool result event
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        name: impl Into<String>,
        status: ToolResultStatus,
        content: Vec<serde_json::Value>,
    ) -> Self {
        AgentEvent::ToolResult {
            tool_use_id: tool_use_id.into(),
            name: name.into(),
            status,
            content,
        }
    }

    /// Short name of the event kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::StreamToken { .. } => "stream_token",
            AgentEvent::ReasoningChunk { .. } => "reasoning_chunk",
            AgentEvent::Message { .. } => "message",
            AgentEvent::ToolResult { .. } => "tool_result",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_matches_serde_tag() {
        let events = vec![
            AgentEvent::stream_token("Hel"),
            AgentEvent::reasoning("hmm"),
            AgentEvent::message(AgentMessage::assistant("Hello")),
            AgentEvent::tool_result("t1", "search", ToolResultStatus::Success, vec![]),
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["kind"], event.kind());
        }
    }
}
