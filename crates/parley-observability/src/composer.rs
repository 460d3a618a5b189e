// Callback composition
//
// Merges independent event sinks into one dispatcher that never fails.
// Each handler sees every event in registration order; a handler that
// returns an error or panics is logged at debug and skipped for that event
// only. Dispatch runs on the caller's stack with no timeouts, so handlers
// must stay cheap and non-blocking.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parley_core::{AgentEvent, EventHandler, HandlerResult};
use tracing::debug;

use crate::context::TraceContext;

/// Fail-silent fan-out over several handlers
#[derive(Default)]
pub struct CompositeHandler {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for CompositeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("CompositeHandler")
            .field("handlers", &names)
            .finish()
    }
}

impl CompositeHandler {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    /// Add a handler after the existing ones
    pub fn add(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl EventHandler for CompositeHandler {
    fn on_event(&self, event: &AgentEvent) -> HandlerResult {
        for handler in &self.handlers {
            match catch_unwind(AssertUnwindSafe(|| handler.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(
                        handler = handler.name(),
                        event = event.kind(),
                        error = %e,
                        "Event handler failed"
                    );
                }
                Err(_) => {
                    debug!(
                        handler = handler.name(),
                        event = event.kind(),
                        "Event handler panicked"
                    );
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CompositeHandler"
    }
}

/// Combine a base handler with the trace context's agent node
///
/// An inactive context returns `base` unchanged (the same `Arc`).
pub fn compose_handlers(
    base: Option<Arc<dyn EventHandler>>,
    context: &TraceContext,
) -> Option<Arc<dyn EventHandler>> {
    let Some(agent_node) = context.agent_node().filter(|_| context.is_active()) else {
        return base;
    };

    let agent_node: Arc<dyn EventHandler> = agent_node.clone();
    let handlers = base.into_iter().chain(Some(agent_node)).collect();
    Some(Arc::new(CompositeHandler::new(handlers)))
}
