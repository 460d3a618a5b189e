// Tool result capture
//
// Agent hook that reports tool activity to the caller while the turn runs.
// It works from the raw tool inputs and outputs, which carry source links
// the agent's messages do not, so citations are extracted here.

use std::sync::Arc;

use parley_core::{AgentHook, ToolInvocation, ToolOutcome, ToolResultStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Receives a tool invocation before it runs
pub type OnThinking = Arc<dyn Fn(&ToolInvocation) + Send + Sync>;

/// Receives a tool's result after it returns
pub type OnToolResult = Arc<dyn Fn(&ToolRunResult) + Send + Sync>;

/// A document a tool returned, usable as a citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedDocument {
    pub content: Value,
    pub source_id: String,
    pub source_name: Option<String>,
    pub source_link: Option<String>,
    pub page_number: Option<u64>,
}

/// A finished tool invocation as reported to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRunResult {
    pub tool_use_id: String,
    pub name: String,
    pub status: ToolResultStatus,
    pub related_documents: Vec<RelatedDocument>,
}

/// Hook forwarding tool activity to caller callbacks
#[derive(Clone, Default)]
pub struct ToolResultCapture {
    display_citation: bool,
    on_thinking: Option<OnThinking>,
    on_tool_result: Option<OnToolResult>,
}

impl ToolResultCapture {
    pub fn new(display_citation: bool) -> Self {
        Self {
            display_citation,
            ..Self::default()
        }
    }

    pub fn on_thinking(mut self, f: Option<OnThinking>) -> Self {
        self.on_thinking = f;
        self
    }

    pub fn on_tool_result(mut self, f: Option<OnToolResult>) -> Self {
        self.on_tool_result = f;
        self
    }

    fn run_result(&self, invocation: &ToolInvocation, outcome: &ToolOutcome) -> ToolRunResult {
        let related_documents = outcome
            .content
            .iter()
            .enumerate()
            .map(|(index, item)| self.related_document(&invocation.tool_use_id, index, item))
            .collect();

        ToolRunResult {
            tool_use_id: invocation.tool_use_id.clone(),
            name: invocation.name.clone(),
            status: outcome.status,
            related_documents,
        }
    }

    fn related_document(&self, tool_use_id: &str, index: usize, item: &Value) -> RelatedDocument {
        let field = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);

        // Single results keep the bare tool id; multi-part results are suffixed
        let source_id = if index == 0 {
            tool_use_id.to_string()
        } else {
            format!("{}@{}", tool_use_id, index)
        };

        RelatedDocument {
            content: item.get("content").cloned().unwrap_or_else(|| item.clone()),
            source_id,
            source_name: field("source_name"),
            source_link: field("source_link").filter(|_| self.display_citation),
            page_number: item.get("page_number").and_then(Value::as_u64),
        }
    }
}

impl AgentHook for ToolResultCapture {
    fn before_tool(&self, invocation: &ToolInvocation) {
        if let Some(f) = &self.on_thinking {
            f(invocation);
        }
    }

    fn after_tool(&self, invocation: &ToolInvocation, outcome: &ToolOutcome) {
        if let Some(f) = &self.on_tool_result {
            f(&self.run_result(invocation, outcome));
        }
    }

    fn name(&self) -> &'static str {
        "ToolResultCapture"
    }
}
