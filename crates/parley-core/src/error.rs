// Error types for chat turns
//
// AgentError is what the agent execution capability returns. The token
// ceiling is modelled as an error variant that carries the partial state
// accumulated up to the point of truncation, so callers can degrade to a
// `max_tokens` completion instead of failing.

use thiserror::Error;

use crate::message::AgentMessage;
use crate::usage::UsageMetrics;

/// Result type alias for agent execution
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur while executing an agent turn
#[derive(Debug, Error)]
pub enum AgentError {
    /// Output was truncated at the model's token ceiling
    #[error("Max tokens reached")]
    MaxTokensReached {
        /// The agent's last recorded message, if any
        last_message: Option<AgentMessage>,
        /// Metrics accumulated before the ceiling was hit
        metrics: UsageMetrics,
    },

    /// Model invocation error
    #[error("Model error: {0}")]
    Model(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentError {
    /// Create a token ceiling signal
    pub fn max_tokens(last_message: Option<AgentMessage>, metrics: UsageMetrics) -> Self {
        AgentError::MaxTokensReached {
            last_message,
            metrics,
        }
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        AgentError::Model(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        AgentError::ToolExecution(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Configuration(msg.into())
    }

    /// Whether this is the token ceiling signal
    pub fn is_max_tokens(&self) -> bool {
        matches!(self, AgentError::MaxTokensReached { .. })
    }
}

/// Failure reported by an event handler
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while building a pricing table
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("Invalid rate for model {model}: {reason}")]
    InvalidRate { model: String, reason: String },

    #[error("Failed to parse pricing table: {0}")]
    Parse(#[from] serde_json::Error),
}
