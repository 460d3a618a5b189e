// HTTP Trace Log Backend
//
// Delivers trace records to a log stream through an HTTP ingestion
// endpoint, in requests of at most `max_batch_size` records:
//
//   POST {endpoint}/streams/{stream_name}/records
//   { "stream_name", "stream_arn", "region", "records": [{ "id", ...record }] }
//
// Records are buffered per trace on append. A flush delivers only its own
// trace's records, so concurrent turns never wait on each other's requests.
// A failed request drops its records; trace logging never retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backend::{ObservabilityError, TraceLog, TraceRecord};
use crate::config::ObservabilityConfig;
use crate::ids::TraceId;

#[derive(Debug, Clone, Serialize)]
struct BatchItem {
    id: String,
    #[serde(flatten)]
    record: TraceRecord,
}

#[derive(Debug, Serialize)]
struct PutRecordsRequest<'a> {
    stream_name: &'a str,
    stream_arn: Option<&'a str>,
    region: &'a str,
    records: &'a [BatchItem],
}

/// Response from the ingestion endpoint
#[derive(Debug, Clone, Default, Deserialize)]
struct PutRecordsResponse {
    #[serde(default)]
    failed_record_count: usize,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorItem {
    id: String,
    message: Option<String>,
}

struct Inner {
    endpoint: String,
    stream_name: String,
    stream_arn: Option<String>,
    region: String,
    api_key: Option<String>,
    max_batch_size: usize,
    client: Client,
    pending: Mutex<HashMap<TraceId, Vec<BatchItem>>>,
    // Per-trace send gates; batches of one trace leave in append order
    gates: Mutex<HashMap<TraceId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Trace log backed by an HTTP ingestion endpoint
#[derive(Clone)]
pub struct HttpTraceLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HttpTraceLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTraceLog")
            .field("endpoint", &self.inner.endpoint)
            .field("stream_name", &self.inner.stream_name)
            .field("region", &self.inner.region)
            .field("max_batch_size", &self.inner.max_batch_size)
            .finish()
    }
}

impl HttpTraceLog {
    /// Create a backend for a stream behind `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Result<Self, ObservabilityError> {
        let config = ObservabilityConfig {
            stream_name: Some(stream_name.into()),
            endpoint: Some(endpoint.into()),
            ..ObservabilityConfig::disabled()
        };
        Self::from_config(&config)?.ok_or_else(|| {
            ObservabilityError::Config("endpoint and stream name must be non-empty".into())
        })
    }

    /// Create a backend from configuration
    ///
    /// Returns `None` when the configuration names no endpoint or stream.
    pub fn from_config(config: &ObservabilityConfig) -> Result<Option<Self>, ObservabilityError> {
        let endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            _ => return Ok(None),
        };
        let stream_name = match config.stream_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(None),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ObservabilityError::Config(e.to_string()))?;

        info!(endpoint = %endpoint, stream = %stream_name, "HTTP trace log configured");

        Ok(Some(Self {
            inner: Arc::new(Inner {
                endpoint,
                stream_name,
                stream_arn: config.stream_arn.clone(),
                region: config.region.clone(),
                api_key: config.api_key.clone(),
                max_batch_size: config.max_batch_size.max(1),
                client,
                pending: Mutex::new(HashMap::new()),
                gates: Mutex::new(HashMap::new()),
            }),
        }))
    }

    /// Number of records waiting for delivery, across all traces
    pub fn pending(&self) -> usize {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    fn has_pending(&self, trace_id: &TraceId) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(trace_id)
            .is_some_and(|items| !items.is_empty())
    }

    fn take_pending(&self, trace_id: &TraceId) -> Vec<BatchItem> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(trace_id)
            .unwrap_or_default()
    }

    fn gate(&self, trace_id: &TraceId) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.inner.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            gates
                .entry(trace_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    // Drops the trace's gate once no other flush holds or waits on it
    fn release_gate(&self, trace_id: &TraceId, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut gates = self.inner.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&gate) == 2 {
            gates.remove(trace_id);
        }
    }

    async fn send_all(
        &self,
        trace_id: &TraceId,
        items: &[BatchItem],
    ) -> Result<(), ObservabilityError> {
        if items.is_empty() {
            return Ok(());
        }

        info!(trace_id = %trace_id, records = items.len(), "Flushing trace records");

        let mut first_error = None;
        for chunk in items.chunks(self.inner.max_batch_size) {
            if let Err(e) = self.send_batch(chunk).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn send_batch(&self, items: &[BatchItem]) -> Result<(), ObservabilityError> {
        let inner = &self.inner;
        let url = format!("{}/streams/{}/records", inner.endpoint, inner.stream_name);
        let body = PutRecordsRequest {
            stream_name: &inner.stream_name,
            stream_arn: inner.stream_arn.as_deref(),
            region: &inner.region,
            records: items,
        };

        debug!(url = %url, batch_size = items.len(), "Sending trace records");

        let mut request = inner
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &inner.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ObservabilityError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, body = %body, "Trace record ingestion failed");
            return Err(ObservabilityError::Export(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ObservabilityError::Connection(e.to_string()))?;
        let result: PutRecordsResponse = if text.trim().is_empty() {
            PutRecordsResponse::default()
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ObservabilityError::Serialization(e.to_string()))?
        };

        for err in &result.errors {
            warn!(id = %err.id, message = ?err.message, "Trace record rejected");
        }

        debug!(
            sent = items.len(),
            failed = result.failed_record_count,
            "Trace records sent"
        );

        Ok(())
    }
}

#[async_trait]
impl TraceLog for HttpTraceLog {
    fn name(&self) -> &'static str {
        "http"
    }

    fn append(&self, record: TraceRecord) -> Result<(), ObservabilityError> {
        let trace_id = record.trace_id().clone();
        let item = BatchItem {
            id: uuid::Uuid::now_v7().to_string(),
            record,
        };
        self.inner
            .pending
            .lock()
            .map_err(|_| ObservabilityError::Write("record buffer lock poisoned".into()))?
            .entry(trace_id)
            .or_default()
            .push(item);
        Ok(())
    }

    async fn flush(&self, trace_id: &TraceId) -> Result<(), ObservabilityError> {
        if !self.has_pending(trace_id) {
            return Ok(());
        }

        let gate = self.gate(trace_id);
        let result = {
            let _sending = gate.lock().await;
            let items = self.take_pending(trace_id);
            self.send_all(trace_id, &items).await
        };
        self.release_gate(trace_id, gate);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TraceStatus;
    use crate::ids::NodeId;
    use chrono::Utc;
    use std::time::Instant;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn trace(conversation_id: &str) -> TraceId {
        TraceId::for_conversation(conversation_id).unwrap()
    }

    fn edge(conversation_id: &str, n: usize) -> TraceRecord {
        TraceRecord::EdgeAdded {
            trace_id: trace(conversation_id),
            from: NodeId::entry(format!("u{}", n)).unwrap(),
            to: NodeId::agent(format!("u{}", n)).unwrap(),
            timestamp: Utc::now(),
        }
    }

    fn config(server: &MockServer, batch: usize) -> ObservabilityConfig {
        ObservabilityConfig {
            max_batch_size: batch,
            api_key: Some("secret".into()),
            ..ObservabilityConfig::for_stream("arn:stream/traces", "traces").with_endpoint(server.uri())
        }
    }

    #[test]
    fn test_from_config_requires_endpoint_and_stream() {
        let no_endpoint = ObservabilityConfig::for_stream("arn", "traces");
        assert!(HttpTraceLog::from_config(&no_endpoint).unwrap().is_none());

        let no_stream = ObservabilityConfig::disabled().with_endpoint("http://localhost:1");
        assert!(HttpTraceLog::from_config(&no_stream).unwrap().is_none());

        assert!(HttpTraceLog::new("", "traces").is_err());
    }

    #[tokio::test]
    async fn test_flush_sends_records_in_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/streams/traces/records"))
            .and(header("x-api-key", "secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "failed_record_count": 0 })),
            )
            .expect(3)
            .mount(&server)
            .await;

        let log = HttpTraceLog::from_config(&config(&server, 2)).unwrap().unwrap();
        for n in 0..5 {
            log.append(edge("c1", n)).unwrap();
        }
        assert_eq!(log.pending(), 5);

        log.flush(&trace("c1")).await.unwrap();
        assert_eq!(log.pending(), 0);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["stream_name"], "traces");
        assert_eq!(body["stream_arn"], "arn:stream/traces");
        assert_eq!(body["records"].as_array().unwrap().len(), 2);
        assert_eq!(body["records"][0]["type"], "edge_added");
        assert_eq!(body["records"][0]["from"], "ENTRY_u0");
        assert!(body["records"][0]["id"].is_string());

        let last: serde_json::Value = serde_json::from_slice(&requests[2].body).unwrap();
        assert_eq!(last["records"][0]["from"], "ENTRY_u4");
    }

    #[tokio::test]
    async fn test_flush_delivers_only_its_own_trace() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let log = HttpTraceLog::from_config(&config(&server, 10)).unwrap().unwrap();
        log.append(edge("c1", 1)).unwrap();
        log.append(edge("c2", 1)).unwrap();
        log.append(edge("c2", 2)).unwrap();

        log.flush(&trace("c1")).await.unwrap();
        assert_eq!(log.pending(), 2);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["records"].as_array().unwrap().len(), 1);
        assert_eq!(body["records"][0]["trace_id"], "CONV_c1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_traces_do_not_wait_on_each_other() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("CONV_slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("CONV_fast"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let log = HttpTraceLog::from_config(&config(&server, 10)).unwrap().unwrap();
        log.append(edge("slow", 1)).unwrap();
        let slow = {
            let log = log.clone();
            tokio::spawn(async move { log.flush(&trace("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        // A trace with nothing buffered returns at once
        let started = Instant::now();
        log.flush(&trace("idle")).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));

        // A trace with its own records pays only for its own request
        log.append(edge("fast", 1)).unwrap();
        let started = Instant::now();
        log.flush(&trace("fast")).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(1000));

        slow.await.unwrap().unwrap();
        assert_eq!(log.pending(), 0);
    }

    #[tokio::test]
    async fn test_flush_reports_http_errors_and_drops_records() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let log = HttpTraceLog::from_config(&config(&server, 10)).unwrap().unwrap();
        log.append(TraceRecord::TraceEnded {
            trace_id: trace("c1"),
            status: TraceStatus::Failed,
            timestamp: Utc::now(),
        })
        .unwrap();

        let result = log.flush(&trace("c1")).await;
        assert!(matches!(result, Err(ObservabilityError::Export(_))));
        assert_eq!(log.pending(), 0);
    }

    #[tokio::test]
    async fn test_empty_flush_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let log = HttpTraceLog::from_config(&config(&server, 10)).unwrap().unwrap();
        log.flush(&trace("c1")).await.unwrap();
    }
}
