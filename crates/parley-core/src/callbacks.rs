// Callback routing
//
// CallbackHandler adapts plain closures into an EventHandler, routing each
// event variant to the matching closure. Tool results are not routed here;
// they reach callers through the ToolResultCapture hook instead.

use std::sync::Arc;

use crate::events::AgentEvent;
use crate::message::AgentMessage;
use crate::traits::{EventHandler, HandlerResult};

/// Receives streamed text tokens
pub type OnStream = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives streamed reasoning chunks
pub type OnReasoning = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives complete messages
pub type OnMessage = Arc<dyn Fn(&AgentMessage) -> HandlerResult + Send + Sync>;

/// Event handler that routes events to optional closures
#[derive(Clone, Default)]
pub struct CallbackHandler {
    on_stream: Option<OnStream>,
    on_reasoning: Option<OnReasoning>,
    on_message: Option<OnMessage>,
}

impl CallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stream(mut self, f: Option<OnStream>) -> Self {
        self.on_stream = f;
        self
    }

    pub fn on_reasoning(mut self, f: Option<OnReasoning>) -> Self {
        self.on_reasoning = f;
        self
    }

    pub fn on_message(mut self, f: Option<OnMessage>) -> Self {
        self.on_message = f;
        self
    }
}

impl EventHandler for CallbackHandler {
    fn on_event(&self, event: &AgentEvent) -> HandlerResult {
        match event {
            AgentEvent::StreamToken { data } => {
                if let Some(f) = &self.on_stream {
                    f(data);
                }
                Ok(())
            }
            AgentEvent::ReasoningChunk { text } => {
                if let Some(f) = &self.on_reasoning {
                    f(text);
                }
                Ok(())
            }
            AgentEvent::Message { message } => match &self.on_message {
                Some(f) => f(message),
                None => Ok(()),
            },
            AgentEvent::ToolResult { .. } => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "CallbackHandler"
    }
}
