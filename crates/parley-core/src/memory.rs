// In-memory implementations for examples and testing
//
// These implementations keep all data in memory, making them useful for:
// - Standalone examples that don't need a real model
// - Unit and integration tests
// - Exercising failure paths deterministically

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{AgentError, HandlerError, Result};
use crate::events::AgentEvent;
use crate::message::AgentMessage;
use crate::traits::{
    AgentExecutor, AgentOutput, AgentSpec, EventHandler, HandlerResult, ToolInvocation,
    ToolOutcome,
};
use crate::usage::{StopReason, UsageMetrics};

// ============================================================================
// ScriptedAgentExecutor - Replays a fixed sequence of events
// ============================================================================

/// One step of a scripted agent run
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit an event into the callback
    Event(AgentEvent),
    /// Run a tool: hooks are notified, then a tool result event is emitted
    Tool {
        invocation: ToolInvocation,
        outcome: ToolOutcome,
    },
}

/// How a scripted run ends
#[derive(Debug, Clone)]
pub enum ScriptOutcome {
    /// Return normally
    Complete {
        stop_reason: StopReason,
        message: AgentMessage,
        metrics: UsageMetrics,
    },
    /// Raise the token ceiling signal
    MaxTokens {
        last_message: Option<AgentMessage>,
        metrics: UsageMetrics,
    },
    /// Fail with a model error
    Fail(String),
}

/// A call received by the scripted executor
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub spec: AgentSpec,
    pub messages: Vec<AgentMessage>,
    pub had_callback: bool,
}

/// Agent executor that replays a script
///
/// Handler errors abort the run, as they would in a real agent engine.
#[derive(Clone)]
pub struct ScriptedAgentExecutor {
    steps: Vec<ScriptStep>,
    outcome: ScriptOutcome,
    calls: Arc<tokio::sync::Mutex<Vec<RecordedCall>>>,
}

impl ScriptedAgentExecutor {
    /// Create an executor that completes with `message` and no events
    pub fn completing(message: AgentMessage, metrics: UsageMetrics) -> Self {
        Self {
            steps: Vec::new(),
            outcome: ScriptOutcome::Complete {
                stop_reason: StopReason::Completed,
                message,
                metrics,
            },
            calls: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    /// Create an executor with an explicit outcome
    pub fn with_outcome(outcome: ScriptOutcome) -> Self {
        Self {
            steps: Vec::new(),
            outcome,
            calls: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        }
    }

    /// Append a step to the script
    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an event step
    pub fn event(self, event: AgentEvent) -> Self {
        self.step(ScriptStep::Event(event))
    }

    /// Calls received so far
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    fn emit(callback: Option<&Arc<dyn EventHandler>>, event: &AgentEvent) -> Result<()> {
        if let Some(callback) = callback {
            callback
                .on_event(event)
                .map_err(|e| AgentError::Internal(anyhow!("callback failed: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AgentExecutor for ScriptedAgentExecutor {
    async fn execute(
        &self,
        spec: &AgentSpec,
        messages: Vec<AgentMessage>,
        callback: Option<Arc<dyn EventHandler>>,
    ) -> Result<AgentOutput> {
        self.calls.lock().await.push(RecordedCall {
            spec: spec.clone(),
            messages,
            had_callback: callback.is_some(),
        });

        for step in &self.steps {
            match step {
                ScriptStep::Event(event) => Self::emit(callback.as_ref(), event)?,
                ScriptStep::Tool {
                    invocation,
                    outcome,
                } => {
                    for hook in &spec.hooks {
                        hook.before_tool(invocation);
                    }
                    for hook in &spec.hooks {
                        hook.after_tool(invocation, outcome);
                    }
                    let event = AgentEvent::tool_result(
                        invocation.tool_use_id.clone(),
                        invocation.name.clone(),
                        outcome.status,
                        outcome.content.clone(),
                    );
                    Self::emit(callback.as_ref(), &event)?;
                }
            }
        }

        match &self.outcome {
            ScriptOutcome::Complete {
                stop_reason,
                message,
                metrics,
            } => Ok(AgentOutput {
                stop_reason: *stop_reason,
                message: message.clone(),
                metrics: metrics.clone(),
            }),
            ScriptOutcome::MaxTokens {
                last_message,
                metrics,
            } => Err(AgentError::max_tokens(last_message.clone(), metrics.clone())),
            ScriptOutcome::Fail(msg) => Err(AgentError::model(msg.clone())),
        }
    }
}

// ============================================================================
// RecordingHandler - Collects events
// ============================================================================

/// Event handler that records every event it receives
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventHandler for RecordingHandler {
    fn on_event(&self, event: &AgentEvent) -> HandlerResult {
        self.events
            .lock()
            .map_err(|_| HandlerError::new("recording handler lock poisoned"))?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingHandler"
    }
}

// ============================================================================
// FailingHandler - Always fails
// ============================================================================

/// How a FailingHandler misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return an error
    Error,
    /// Panic
    Panic,
}

/// Event handler that fails on every event, counting invocations
#[derive(Debug)]
pub struct FailingHandler {
    mode: FailureMode,
    calls: std::sync::atomic::AtomicUsize,
}

impl FailingHandler {
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl EventHandler for FailingHandler {
    fn on_event(&self, event: &AgentEvent) -> HandlerResult {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match self.mode {
            FailureMode::Error => Err(HandlerError::new(format!(
                "refusing {} event",
                event.kind()
            ))),
            FailureMode::Panic => panic!("handler panicked on {} event", event.kind()),
        }
    }

    fn name(&self) -> &'static str {
        "FailingHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolResultStatus;
    use crate::traits::AgentHook;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(hooks: Vec<Arc<dyn AgentHook>>) -> AgentSpec {
        AgentSpec {
            instructions: vec![],
            model: "test-model".to_string(),
            generation_params: None,
            guardrail: None,
            enable_reasoning: false,
            prompt_caching_enabled: true,
            has_tools: true,
            tools: vec!["search".to_string()],
            hooks,
        }
    }

    #[tokio::test]
    async fn test_scripted_executor_replays_events_and_hooks() {
        struct CountingHook(AtomicUsize, AtomicUsize);
        impl AgentHook for CountingHook {
            fn before_tool(&self, _invocation: &ToolInvocation) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn after_tool(&self, _invocation: &ToolInvocation, _outcome: &ToolOutcome) {
                self.1.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hook = Arc::new(CountingHook(AtomicUsize::new(0), AtomicUsize::new(0)));
        let recorder = Arc::new(RecordingHandler::new());

        let executor =
            ScriptedAgentExecutor::completing(AgentMessage::assistant("done"), UsageMetrics::default())
                .event(AgentEvent::stream_token("do"))
                .step(ScriptStep::Tool {
                    invocation: ToolInvocation {
                        tool_use_id: "t1".to_string(),
                        name: "search".to_string(),
                        input: json!({"q": "x"}),
                    },
                    outcome: ToolOutcome {
                        status: ToolResultStatus::Success,
                        content: vec![json!({"text": "found"})],
                    },
                });

        let output = executor
            .execute(
                &spec(vec![hook.clone()]),
                vec![AgentMessage::user("hi")],
                Some(recorder.clone()),
            )
            .await
            .unwrap();

        assert_eq!(output.stop_reason, StopReason::Completed);
        assert_eq!(hook.0.load(Ordering::SeqCst), 1);
        assert_eq!(hook.1.load(Ordering::SeqCst), 1);

        let kinds: Vec<_> = recorder.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["stream_token", "tool_result"]);

        let calls = executor.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].had_callback);
        assert_eq!(calls[0].messages, vec![AgentMessage::user("hi")]);
    }

    #[tokio::test]
    async fn test_scripted_executor_propagates_handler_errors() {
        let executor =
            ScriptedAgentExecutor::completing(AgentMessage::assistant("done"), UsageMetrics::default())
                .event(AgentEvent::stream_token("x"));

        let failing = Arc::new(FailingHandler::new(FailureMode::Error));
        let err = executor
            .execute(&spec(vec![]), vec![], Some(failing.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Internal(_)));
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_executor_max_tokens() {
        let executor = ScriptedAgentExecutor::with_outcome(ScriptOutcome::MaxTokens {
            last_message: Some(AgentMessage::assistant("partial")),
            metrics: UsageMetrics::default(),
        });

        let err = executor.execute(&spec(vec![]), vec![], None).await.unwrap_err();
        assert!(err.is_max_tokens());
    }
}
