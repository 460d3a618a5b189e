// Core chat abstractions
//
// This crate provides the backend-agnostic vocabulary of a chat turn:
// messages, agent events, event handlers and the capabilities a turn
// depends on (agent execution, pricing).
//
// Key design decisions:
// - The agent engine is a black box behind the AgentExecutor trait
// - Every streamed or tool event is one AgentEvent variant; sinks implement EventHandler
// - Handlers are synchronous and run on the agent's own call stack
// - The token ceiling is an AgentError variant carrying the partial run state
// - Pricing is a pure lookup behind the PricingTable trait

pub mod bot;
pub mod callbacks;
pub mod chat;
pub mod error;
pub mod events;
pub mod message;
pub mod model_settings;
pub mod pricing;
pub mod traits;
pub mod usage;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use bot::{BotConfig, GenerationParams, GuardrailConfig};
pub use callbacks::{CallbackHandler, OnMessage, OnReasoning, OnStream};
pub use chat::{ChatInput, MessageInput, SearchResult};
pub use error::{AgentError, HandlerError, PricingError, Result};
pub use events::AgentEvent;
pub use message::{
    AgentMessage, ContentBlock, MessageModel, MessageRole, SimpleMessage, ToolResultStatus,
};
pub use model_settings::ModelSettings;
pub use pricing::{ModelPricing, PricingTable, StaticPricingTable};
pub use traits::{
    AgentExecutor, AgentHook, AgentOutput, AgentSpec, EventHandler, HandlerResult,
    ToolInvocation, ToolOutcome,
};
pub use usage::{StopReason, TokenCounts, Usage, UsageMetrics};
