// Chat request types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ContentBlock;

/// The user message submitted for a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInput {
    /// Identifier of the user message; trace node ids are derived from it
    pub message_id: String,
    pub content: Vec<ContentBlock>,
    /// Model requested for the turn (blank means "use the default model")
    #[serde(default)]
    pub model: String,
}

/// Input for one chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: MessageInput,
    #[serde(default)]
    pub enable_reasoning: bool,
}

impl ChatInput {
    /// Create a text chat input with a freshly generated message id
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            message: MessageInput {
                message_id: Uuid::now_v7().to_string(),
                content: vec![ContentBlock::text(text)],
                model: model.into(),
            },
            enable_reasoning: false,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message.message_id = message_id.into();
        self
    }

    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.enable_reasoning = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.message.model
    }

    pub fn message_id(&self) -> &str {
        &self.message.message_id
    }
}

/// A retrieved knowledge snippet supplied as context for the turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub content: String,
    pub source_name: String,
    #[serde(default)]
    pub source_link: Option<String>,
    #[serde(default)]
    pub page_number: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_generates_message_id() {
        let a = ChatInput::new("claude-v3.7-sonnet", "hi");
        let b = ChatInput::new("claude-v3.7-sonnet", "hi");
        assert!(!a.message_id().is_empty());
        assert_ne!(a.message_id(), b.message_id());

        let fixed = a.with_message_id("u1");
        assert_eq!(fixed.message_id(), "u1");
        assert_eq!(fixed.model(), "claude-v3.7-sonnet");
    }
}
