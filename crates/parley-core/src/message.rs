// Message types
//
// Two shapes of message flow through a turn:
// - AgentMessage: what the agent execution capability consumes and emits
// - SimpleMessage / MessageModel: the persisted conversation representation
//
// Both share the same ContentBlock vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Outcome of a tool invocation as reported in a tool result block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Success,
    Error,
}

/// A single content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text { body: String },

    /// Tool invocation requested by the assistant
    ToolUse {
        tool_use_id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Result of a tool invocation
    ToolResult {
        tool_use_id: String,
        status: ToolResultStatus,
        content: Vec<serde_json::Value>,
    },

    /// Model reasoning output
    Reasoning {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

impl ContentBlock {
    /// Create a text block
    pub fn text(body: impl Into<String>) -> Self {
        ContentBlock::Text { body: body.into() }
    }

    /// Whether this block is a tool use or tool result
    pub fn is_tool_activity(&self) -> bool {
        matches!(
            self,
            ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. }
        )
    }

    /// Text body if this is a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { body } => Some(body),
            _ => None,
        }
    }
}

/// A message exchanged with the agent execution capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl AgentMessage {
    /// Create a user message with a single text block
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with a single text block
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create an assistant message with no content
    pub fn empty_assistant() -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Vec::new(),
        }
    }

    /// Whether any block is a tool use or tool result
    pub fn has_tool_activity(&self) -> bool {
        self.content.iter().any(ContentBlock::is_tool_activity)
    }

    /// Concatenated text of all text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Lightweight persisted message, used for history and the thinking log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleMessage {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
}

impl SimpleMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Body of the first content block, if it is text
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(ContentBlock::as_text)
    }
}

impl From<&AgentMessage> for SimpleMessage {
    fn from(message: &AgentMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

impl From<&SimpleMessage> for AgentMessage {
    fn from(message: &SimpleMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Full persisted assistant message produced at the end of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageModel {
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    /// Model that produced the message
    pub model: String,
    /// Tool use/result messages produced during the turn, in order
    #[serde(default)]
    pub thinking_log: Vec<SimpleMessage>,
    pub create_time: DateTime<Utc>,
}
