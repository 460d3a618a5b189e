// Trace graph observability for chat turns
//
// This crate records each chat turn as nodes and edges in an append-only
// trace log, and fans agent events out to several sinks at once.
// Key design decisions:
// - Node ids are derived from message ids, so stateless invocations can
//   reattach to a trace without a lookup
// - Backends implement the TraceLog trait; append is synchronous and
//   buffered, flush is async and scoped to one trace
// - Every public entry point is a boundary: failures are logged and degrade
//   to "disabled", never reaching the caller
// - HTTP ingestion backend is feature-flagged

pub mod backend;
pub mod composer;
pub mod config;
pub mod context;
pub mod ids;
pub mod logger;
pub mod reattach;

#[cfg(feature = "http")]
pub mod http;

// In-memory implementation for examples and testing
pub mod memory;

use std::sync::{Arc, OnceLock};

use serde_json::Value;

// Re-exports
pub use backend::{NodeConfig, ObservabilityError, TraceLog, TraceRecord, TraceStatus};
pub use composer::{compose_handlers, CompositeHandler};
pub use config::{get_config, load_config, reset_config, ObservabilityConfig};
pub use context::{complete_trace_context, create_trace_context, TraceContext, TraceRequest};
pub use ids::{NodeId, NodeRole, TraceId};
pub use logger::{NodeHandle, TraceLogger};
pub use memory::InMemoryTraceLog;
pub use reattach::{append_output_node, OutputNodeRequest};

#[cfg(feature = "http")]
pub use http::HttpTraceLog;

static GLOBAL_BACKEND: OnceLock<Option<Arc<dyn TraceLog>>> = OnceLock::new();

/// Process-wide trace log backend, resolved on first use
///
/// Resolution happens at most once; later calls return the same handle
/// regardless of the configuration passed.
pub fn global_backend(config: &ObservabilityConfig) -> Option<Arc<dyn TraceLog>> {
    GLOBAL_BACKEND
        .get_or_init(|| resolve_backend(config))
        .clone()
}

#[cfg(feature = "http")]
fn resolve_backend(config: &ObservabilityConfig) -> Option<Arc<dyn TraceLog>> {
    match HttpTraceLog::from_config(config) {
        Ok(Some(backend)) => Some(Arc::new(backend)),
        Ok(None) => {
            tracing::debug!("No trace log endpoint configured");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize trace log backend");
            None
        }
    }
}

#[cfg(not(feature = "http"))]
fn resolve_backend(_config: &ObservabilityConfig) -> Option<Arc<dyn TraceLog>> {
    None
}

/// Configuration and backend threaded through every observability entry point
#[derive(Clone)]
pub struct Observability {
    config: ObservabilityConfig,
    backend: Option<Arc<dyn TraceLog>>,
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("config", &self.config)
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl Default for Observability {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Observability {
    pub fn new(config: ObservabilityConfig, backend: Option<Arc<dyn TraceLog>>) -> Self {
        Self { config, backend }
    }

    /// Process-wide configuration and backend
    pub fn from_env() -> Self {
        let config = get_config();
        let backend = if config.is_active() {
            global_backend(&config)
        } else {
            None
        };
        Self::new(config, backend)
    }

    pub fn disabled() -> Self {
        Self::new(ObservabilityConfig::disabled(), None)
    }

    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    pub fn backend(&self) -> Option<&Arc<dyn TraceLog>> {
        self.backend.as_ref()
    }

    /// Whether turns will be traced
    pub fn is_enabled(&self) -> bool {
        self.config.is_active() && self.backend.is_some()
    }

    pub async fn create_context(&self, request: &TraceRequest) -> TraceContext {
        create_trace_context(request, &self.config, self.backend.as_ref()).await
    }

    pub async fn complete_context(
        &self,
        context: &TraceContext,
        result: Option<Value>,
        status: TraceStatus,
        error: Option<&str>,
    ) {
        complete_trace_context(context, result, status, error).await
    }

    pub async fn append_output_node(&self, request: &OutputNodeRequest) {
        append_output_node(request, &self.config, self.backend.as_ref()).await
    }
}
