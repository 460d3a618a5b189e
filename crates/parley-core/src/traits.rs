// Core traits for pluggable capabilities
//
// These traits keep the turn orchestration independent of the concrete
// agent engine and of whatever consumes its events:
// - EventHandler: a sink for AgentEvents (streaming, persistence, tracing)
// - AgentHook: lifecycle callbacks around tool invocations
// - AgentExecutor: the black-box agent execution capability

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::bot::{GenerationParams, GuardrailConfig};
use crate::error::{HandlerError, Result};
use crate::events::AgentEvent;
use crate::message::{AgentMessage, ToolResultStatus};
use crate::usage::{StopReason, UsageMetrics};

// ============================================================================
// EventHandler - Receives events while the agent runs
// ============================================================================

/// Result type for event handlers
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Trait for sinks that receive agent events
///
/// Handlers are invoked synchronously on the agent's call stack, once per
/// event. They must be cheap and non-blocking: nothing imposes a timeout on
/// a handler, so a slow handler adds its latency directly to the turn.
pub trait EventHandler: Send + Sync {
    /// Handle a single event
    fn on_event(&self, event: &AgentEvent) -> HandlerResult;

    /// Human-readable name for logging/debugging
    fn name(&self) -> &'static str {
        "EventHandler"
    }
}

// ============================================================================
// AgentHook - Tool lifecycle callbacks
// ============================================================================

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_use_id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// What a tool invocation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: ToolResultStatus,
    pub content: Vec<serde_json::Value>,
}

/// Lifecycle hook registered with the agent
///
/// Hooks see raw tool inputs and outputs, which are not always visible in
/// the messages the agent emits.
pub trait AgentHook: Send + Sync {
    /// Called before a tool is invoked
    fn before_tool(&self, _invocation: &ToolInvocation) {}

    /// Called after a tool returns
    fn after_tool(&self, _invocation: &ToolInvocation, _outcome: &ToolOutcome) {}

    fn name(&self) -> &'static str {
        "AgentHook"
    }
}

// ============================================================================
// AgentExecutor - The agent execution capability
// ============================================================================

/// Everything the agent capability needs to build its delegate for one turn
#[derive(Clone)]
pub struct AgentSpec {
    pub instructions: Vec<String>,
    pub model: String,
    pub generation_params: Option<GenerationParams>,
    pub guardrail: Option<GuardrailConfig>,
    pub enable_reasoning: bool,
    pub prompt_caching_enabled: bool,
    pub has_tools: bool,
    /// Tools available to the agent (empty unless `has_tools`)
    pub tools: Vec<String>,
    pub hooks: Vec<Arc<dyn AgentHook>>,
}

impl std::fmt::Debug for AgentSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSpec")
            .field("instructions", &self.instructions)
            .field("model", &self.model)
            .field("generation_params", &self.generation_params)
            .field("guardrail", &self.guardrail)
            .field("enable_reasoning", &self.enable_reasoning)
            .field("prompt_caching_enabled", &self.prompt_caching_enabled)
            .field("has_tools", &self.has_tools)
            .field("tools", &self.tools)
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Final state of a completed agent run
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub stop_reason: StopReason,
    pub message: AgentMessage,
    pub metrics: UsageMetrics,
}

/// Trait for the agent execution capability
///
/// Implementations run the model/tool loop for one turn, invoking `callback`
/// for every event and the `AgentSpec` hooks around every tool call. Output
/// truncated at the token ceiling is reported as
/// [`AgentError::MaxTokensReached`](crate::error::AgentError::MaxTokensReached).
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(
        &self,
        spec: &AgentSpec,
        messages: Vec<AgentMessage>,
        callback: Option<Arc<dyn EventHandler>>,
    ) -> Result<AgentOutput>;
}
