// Chat turn orchestration
//
// Drives one conversation turn against the agent capability:
// 1. Opens the turn's trace context (inactive when tracing is off)
// 2. Builds the agent spec with the tool-capture hook
// 3. Composes the caller's sinks, the thinking-log sink and the agent node
// 4. Executes, degrading the token ceiling to a `max_tokens` result
// 5. Completes the trace, converts the message, computes usage and price

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use parley_core::{
    AgentError, AgentExecutor, AgentHook, AgentMessage, AgentSpec, BotConfig, CallbackHandler,
    ChatInput, EventHandler, GenerationParams, GuardrailConfig, HandlerError, MessageModel,
    ModelSettings, OnMessage, OnReasoning, OnStream, PricingTable, SearchResult, SimpleMessage,
    StopReason, TokenCounts,
};
use parley_observability::{
    compose_handlers, Observability, OutputNodeRequest, TraceRequest, TraceStatus,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::converters::{latest_user_text, to_agent_messages, to_message_model};
use crate::error::{ChatError, Result};
use crate::tool_capture::{OnThinking, OnToolResult, ToolResultCapture};

/// Everything one turn needs
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub bot: Option<BotConfig>,
    pub chat_input: ChatInput,
    pub instructions: Vec<String>,
    pub generation_params: Option<GenerationParams>,
    pub guardrail: Option<GuardrailConfig>,
    pub display_citation: bool,
    /// Conversation history, ending with the message being answered
    pub messages: Vec<SimpleMessage>,
    pub search_results: Vec<SearchResult>,
    pub conversation_id: Option<String>,
}

impl ChatTurn {
    pub fn new(chat_input: ChatInput, messages: Vec<SimpleMessage>) -> Self {
        Self {
            bot: None,
            chat_input,
            instructions: Vec::new(),
            generation_params: None,
            guardrail: None,
            display_citation: false,
            messages,
            search_results: Vec::new(),
            conversation_id: None,
        }
    }

    pub fn with_bot(mut self, bot: BotConfig) -> Self {
        self.bot = Some(bot);
        self
    }

    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_search_results(
        mut self,
        search_results: Vec<SearchResult>,
        display_citation: bool,
    ) -> Self {
        self.search_results = search_results;
        self.display_citation = display_citation;
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Caller callbacks for a turn; all optional
#[derive(Clone, Default)]
pub struct TurnCallbacks {
    pub on_stream: Option<OnStream>,
    pub on_thinking: Option<OnThinking>,
    pub on_tool_result: Option<OnToolResult>,
    pub on_reasoning: Option<OnReasoning>,
}

impl std::fmt::Debug for TurnCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCallbacks")
            .field("on_stream", &self.on_stream.is_some())
            .field("on_thinking", &self.on_thinking.is_some())
            .field("on_tool_result", &self.on_tool_result.is_some())
            .field("on_reasoning", &self.on_reasoning.is_some())
            .finish()
    }
}

/// Outcome of a turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResult {
    pub message: MessageModel,
    pub stop_reason: StopReason,
    pub token_counts: TokenCounts,
    /// Cost of the turn in USD
    pub price: f64,
}

/// Drives chat turns
#[derive(Clone)]
pub struct ChatOrchestrator {
    executor: Arc<dyn AgentExecutor>,
    pricing: Arc<dyn PricingTable>,
    observability: Observability,
    models: ModelSettings,
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("observability", &self.observability)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl ChatOrchestrator {
    /// Create an orchestrator with tracing disabled and default model settings
    pub fn new(executor: Arc<dyn AgentExecutor>, pricing: Arc<dyn PricingTable>) -> Self {
        Self {
            executor,
            pricing,
            observability: Observability::disabled(),
            models: ModelSettings::default(),
        }
    }

    /// Create an orchestrator with tracing and model settings from the environment
    pub fn from_env(executor: Arc<dyn AgentExecutor>, pricing: Arc<dyn PricingTable>) -> Self {
        Self::new(executor, pricing)
            .with_observability(Observability::from_env())
            .with_model_settings(ModelSettings::from_env())
    }

    pub fn with_observability(mut self, observability: Observability) -> Self {
        self.observability = observability;
        self
    }

    pub fn with_model_settings(mut self, models: ModelSettings) -> Self {
        self.models = models;
        self
    }

    pub fn observability(&self) -> &Observability {
        &self.observability
    }

    /// Run one turn
    ///
    /// Only agent failures other than the token ceiling, and disallowed
    /// models, are returned as errors. Tracing failures never are.
    pub async fn run(&self, turn: ChatTurn, callbacks: TurnCallbacks) -> Result<TurnResult> {
        let model = self.models.resolve(turn.chat_input.model()).to_string();
        if !self.models.is_available(&model) {
            return Err(ChatError::model_not_available(model));
        }

        let tool_capture = ToolResultCapture::new(turn.display_citation)
            .on_thinking(callbacks.on_thinking)
            .on_tool_result(callbacks.on_tool_result);

        let mut request = TraceRequest::new(
            format!("chat_{}", model),
            format!("Chat: {}", model),
            turn.chat_input.message_id(),
        );
        if let Some(bot) = &turn.bot {
            request = request.with_bot_id(bot.id.clone());
        }
        if let Some(conversation_id) = &turn.conversation_id {
            request = request.with_conversation_id(conversation_id.clone());
        }
        let trace = self.observability.create_context(&request).await;

        if trace.is_active() {
            if let Some(input) = latest_user_text(&turn.messages) {
                trace.record_input(input);
            }
        }

        let prompt_caching_enabled = turn
            .bot
            .as_ref()
            .map_or(true, |bot| bot.prompt_caching_enabled);
        let has_tools = turn.bot.as_ref().is_some_and(BotConfig::is_agent_enabled);

        let hooks: Vec<Arc<dyn AgentHook>> = vec![Arc::new(tool_capture)];
        let spec = AgentSpec {
            instructions: turn.instructions,
            model: model.clone(),
            generation_params: turn.generation_params,
            guardrail: turn.guardrail,
            enable_reasoning: turn.chat_input.enable_reasoning,
            prompt_caching_enabled,
            has_tools,
            tools: match (&turn.bot, has_tools) {
                (Some(bot), true) => bot.tools.clone(),
                _ => Vec::new(),
            },
            hooks,
        };

        let thinking_log: Arc<Mutex<Vec<SimpleMessage>>> = Arc::new(Mutex::new(Vec::new()));
        let on_message: OnMessage = {
            let thinking_log = Arc::clone(&thinking_log);
            Arc::new(move |message: &AgentMessage| {
                if message.has_tool_activity() {
                    thinking_log
                        .lock()
                        .map_err(|_| HandlerError::new("thinking log lock poisoned"))?
                        .push(SimpleMessage::from(message));
                }
                Ok(())
            })
        };

        let base: Arc<dyn EventHandler> = Arc::new(
            CallbackHandler::new()
                .on_stream(callbacks.on_stream)
                .on_reasoning(callbacks.on_reasoning)
                .on_message(Some(on_message)),
        );
        let callback = compose_handlers(Some(base), &trace);

        let messages = to_agent_messages(&turn.messages, &turn.search_results);

        let (stop_reason, message, metrics) =
            match self.executor.execute(&spec, messages, callback).await {
                Ok(output) => (output.stop_reason, output.message, output.metrics),
                Err(AgentError::MaxTokensReached {
                    last_message,
                    metrics,
                }) => {
                    warn!(model = %model, "Token ceiling reached; returning partial turn");
                    (
                        StopReason::MaxTokens,
                        last_message.unwrap_or_else(AgentMessage::empty_assistant),
                        metrics,
                    )
                }
                Err(e) => {
                    let error = e.to_string();
                    self.observability
                        .complete_context(&trace, None, TraceStatus::Failed, Some(&error))
                        .await;
                    return Err(e.into());
                }
            };

        let status = match stop_reason {
            StopReason::Error => TraceStatus::Failed,
            StopReason::Completed | StopReason::MaxTokens => TraceStatus::Completed,
        };
        self.observability
            .complete_context(&trace, None, status, None)
            .await;

        let thinking_log = thinking_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let message = to_message_model(&message, &model, Utc::now(), thinking_log);

        let token_counts = metrics.token_counts();
        let price = self.pricing.price(&model, &token_counts);

        info!(
            input = token_counts.input,
            output = token_counts.output,
            cache_read_input = token_counts.cache_read,
            cache_write_input = token_counts.cache_write,
            "Token count"
        );
        info!(model = %model, price, stop_reason = %stop_reason, "Turn finished");

        Ok(TurnResult {
            message,
            stop_reason,
            token_counts,
            price,
        })
    }

    /// Attach a persisted assistant message to its turn's trace
    pub async fn append_output_node(&self, request: &OutputNodeRequest) {
        self.observability.append_output_node(request).await
    }
}
