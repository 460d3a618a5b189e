// Per-turn chat orchestration
//
// Ties the core abstractions and the trace graph together into a single
// `ChatOrchestrator::run` call per conversation turn.
// Key design decisions:
// - The agent engine, pricing table and trace log are injected capabilities
// - The token ceiling is a successful `max_tokens` turn, not an error
// - Tracing can only ever degrade to "disabled"; it never fails a turn

pub mod converters;
pub mod error;
pub mod orchestrator;
pub mod tool_capture;

// Re-exports
pub use error::{ChatError, Result};
pub use orchestrator::{ChatOrchestrator, ChatTurn, TurnCallbacks, TurnResult};
pub use tool_capture::{OnThinking, OnToolResult, RelatedDocument, ToolResultCapture, ToolRunResult};
