// In-memory trace log
//
// Keeps every appended record in memory. Used by tests and examples to
// inspect the trace graph a turn produced, and to inject write failures.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::backend::{ObservabilityError, TraceLog, TraceRecord};
use crate::ids::TraceId;

#[derive(Debug, Default)]
struct Inner {
    records: Mutex<Vec<TraceRecord>>,
    fail_kinds: Mutex<HashSet<&'static str>>,
    fail_flush: AtomicBool,
    append_calls: AtomicUsize,
    flushed: Mutex<Vec<TraceId>>,
}

/// Trace log backed by a vector
#[derive(Debug, Clone, Default)]
pub struct InMemoryTraceLog {
    inner: Arc<Inner>,
}

impl InMemoryTraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every append of the given record kind (e.g. `"node_created"`)
    pub fn failing_on(self, kind: &'static str) -> Self {
        self.inner
            .fail_kinds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
        self
    }

    /// Fail every flush
    pub fn failing_flush(self) -> Self {
        self.inner.fail_flush.store(true, Ordering::SeqCst);
        self
    }

    /// Records appended so far, in order
    pub fn records(&self) -> Vec<TraceRecord> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ids of created nodes, in creation order
    pub fn nodes(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                TraceRecord::NodeCreated { node_id, .. } => Some(node_id.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Edges as `(from, to)` id pairs, in insertion order
    pub fn edges(&self) -> Vec<(String, String)> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                TraceRecord::EdgeAdded { from, to, .. } => Some((from.to_string(), to.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Number of append attempts, including failed ones
    pub fn append_calls(&self) -> usize {
        self.inner.append_calls.load(Ordering::SeqCst)
    }

    /// Number of successful flushes
    pub fn flush_count(&self) -> usize {
        self.flushed_traces().len()
    }

    /// Traces flushed successfully, in flush order
    pub fn flushed_traces(&self) -> Vec<TraceId> {
        self.inner
            .flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TraceLog for InMemoryTraceLog {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn append(&self, record: TraceRecord) -> Result<(), ObservabilityError> {
        self.inner.append_calls.fetch_add(1, Ordering::SeqCst);

        let kind = record.kind();
        if self
            .inner
            .fail_kinds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(kind)
        {
            return Err(ObservabilityError::Write(format!(
                "injected failure on {}",
                kind
            )));
        }

        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn flush(&self, trace_id: &TraceId) -> Result<(), ObservabilityError> {
        if self.inner.fail_flush.load(Ordering::SeqCst) {
            return Err(ObservabilityError::Export("injected flush failure".into()));
        }
        self.inner
            .flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(trace_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TraceStatus;
    use chrono::Utc;

    fn edge(from: &str, to: &str) -> TraceRecord {
        TraceRecord::EdgeAdded {
            trace_id: TraceId::for_conversation("c1").unwrap(),
            from: from.parse().unwrap(),
            to: to.parse().unwrap(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_records_edges_in_order() {
        let log = InMemoryTraceLog::new();
        log.append(edge("ENTRY_u1", "AGENT_u1")).unwrap();
        log.append(edge("AGENT_u1", "MSG_a1")).unwrap();
        let trace_id = TraceId::for_conversation("c1").unwrap();
        log.flush(&trace_id).await.unwrap();

        assert_eq!(
            log.edges(),
            vec![
                ("ENTRY_u1".to_string(), "AGENT_u1".to_string()),
                ("AGENT_u1".to_string(), "MSG_a1".to_string()),
            ]
        );
        assert_eq!(log.append_calls(), 2);
        assert_eq!(log.flushed_traces(), vec![trace_id]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let log = InMemoryTraceLog::new()
            .failing_on("trace_ended")
            .failing_flush();

        let result = log.append(TraceRecord::TraceEnded {
            trace_id: TraceId::for_conversation("c1").unwrap(),
            status: TraceStatus::Completed,
            timestamp: Utc::now(),
        });
        assert!(matches!(result, Err(ObservabilityError::Write(_))));
        assert!(log
            .flush(&TraceId::for_conversation("c1").unwrap())
            .await
            .is_err());

        assert_eq!(log.append_calls(), 1);
        assert!(log.records().is_empty());
        assert_eq!(log.flush_count(), 0);
    }
}
