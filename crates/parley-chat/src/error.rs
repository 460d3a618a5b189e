// Chat error types

use parley_core::AgentError;
use thiserror::Error;

/// Result type for chat turns
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that escape a chat turn
///
/// The token ceiling never appears here: it is reported as a successful
/// `max_tokens` turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The agent capability failed
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// The requested model is not in the deployment's allow-list
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),
}

impl ChatError {
    pub fn model_not_available(model: impl Into<String>) -> Self {
        ChatError::ModelNotAvailable(model.into())
    }
}
