// Bot configuration
//
// BotConfig is the subset of a custom bot record that influences how a turn
// is executed. Generation parameters and guardrails are passed through to the
// agent capability untouched.

use serde::{Deserialize, Serialize};

/// Custom bot configuration relevant to a chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub id: String,

    /// Whether prompt caching is enabled for this bot
    #[serde(default = "default_prompt_caching")]
    pub prompt_caching_enabled: bool,

    /// Tools the bot's agent may call
    #[serde(default)]
    pub tools: Vec<String>,
}

fn default_prompt_caching() -> bool {
    true
}

impl BotConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt_caching_enabled: default_prompt_caching(),
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_prompt_caching(mut self, enabled: bool) -> Self {
        self.prompt_caching_enabled = enabled;
        self
    }

    /// A bot acts as an agent when it has at least one tool configured
    pub fn is_agent_enabled(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Sampling parameters for the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            top_k: Some(250),
            top_p: Some(0.999),
            temperature: Some(0.6),
            stop_sequences: Vec::new(),
        }
    }
}

/// Content guardrail applied by the model provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub identifier: String,
    pub version: String,
    #[serde(default)]
    pub grounding_threshold: Option<f64>,
    #[serde(default)]
    pub relevance_threshold: Option<f64>,
}
