// Observability Configuration
//
// Configuration for trace logging, loaded from environment variables once
// per process. `get_config` memoizes the loaded value; `reset_config` clears
// the memo so the next `get_config` reloads (intended for tests).

use std::env;
use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Configuration for trace logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Whether trace logging is switched on
    pub enabled: bool,

    /// Identifier (ARN) of the log stream; its presence enables the feature
    pub stream_arn: Option<String>,

    /// Name of the log stream; required when enabled
    pub stream_name: Option<String>,

    /// Region hosting the log stream
    pub region: String,

    /// Ingestion endpoint of the HTTP trace log backend
    pub endpoint: Option<String>,

    /// API key sent to the ingestion endpoint
    pub api_key: Option<String>,

    /// Maximum number of records per ingestion request
    pub max_batch_size: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ObservabilityConfig {
    /// Configuration with trace logging switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            stream_arn: None,
            stream_name: None,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            api_key: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    /// Enabled configuration for the given stream
    pub fn for_stream(stream_arn: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            stream_arn: Some(stream_arn.into()),
            stream_name: Some(stream_name.into()),
            ..Self::disabled()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `TRACE_LOG_STREAM_ARN`: Log stream identifier; non-empty enables tracing
    /// - `TRACE_LOG_STREAM_NAME`: Log stream name (required when enabled)
    /// - `TRACE_LOG_REGION`: Region (default: us-east-1)
    /// - `TRACE_LOG_ENDPOINT`: Ingestion endpoint of the HTTP backend
    /// - `TRACE_LOG_API_KEY`: API key for the ingestion endpoint
    /// - `TRACE_LOG_MAX_BATCH_SIZE`: Records per ingestion request (default: 100)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let stream_arn = non_empty("TRACE_LOG_STREAM_ARN");
        let enabled = stream_arn.is_some();

        let region = non_empty("TRACE_LOG_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());

        let max_batch_size = lookup("TRACE_LOG_MAX_BATCH_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|size: &usize| *size > 0)
            .unwrap_or(DEFAULT_MAX_BATCH_SIZE);

        let config = Self {
            enabled,
            stream_arn,
            stream_name: non_empty("TRACE_LOG_STREAM_NAME"),
            region,
            endpoint: non_empty("TRACE_LOG_ENDPOINT"),
            api_key: non_empty("TRACE_LOG_API_KEY"),
            max_batch_size,
        };

        if config.enabled {
            info!(region = %config.region, "Trace logging enabled");
            if !config.is_valid() {
                warn!("TRACE_LOG_STREAM_ARN is set but TRACE_LOG_STREAM_NAME is not; trace logging will be disabled");
            }
        }

        config
    }

    /// Whether the configuration is complete for its enabled state
    pub fn is_valid(&self) -> bool {
        if !self.enabled {
            return true;
        }
        self.stream_name.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Enabled and valid; an invalid enabled configuration counts as disabled
    pub fn is_active(&self) -> bool {
        self.enabled && self.is_valid()
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

// ============================================================================
// Process-wide memo
// ============================================================================

static CONFIG: RwLock<Option<ObservabilityConfig>> = RwLock::new(None);

/// Load configuration from the environment without memoizing
pub fn load_config() -> ObservabilityConfig {
    ObservabilityConfig::from_env()
}

/// Process-wide configuration, loaded on first use
///
/// Reads take a shared `RwLock` guard rather than being lock-free, because
/// `reset_config` can replace the memo; readers never contend with each
/// other, only with a concurrent load or reset.
pub fn get_config() -> ObservabilityConfig {
    if let Some(config) = CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return config.clone();
    }

    let mut slot = CONFIG.write().unwrap_or_else(PoisonError::into_inner);
    slot.get_or_insert_with(load_config).clone()
}

/// Clear the memoized configuration; the next `get_config` reloads it
pub fn reset_config() {
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_disabled_without_stream_arn() {
        let config = ObservabilityConfig::from_lookup(lookup(&[("TRACE_LOG_STREAM_NAME", "s1")]));
        assert!(!config.enabled);
        assert!(config.is_valid());
        assert!(!config.is_active());
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    fn test_empty_stream_arn_does_not_enable() {
        let config = ObservabilityConfig::from_lookup(lookup(&[("TRACE_LOG_STREAM_ARN", "  ")]));
        assert!(!config.enabled);
    }

    #[test]
    fn test_enabled_and_valid() {
        let config = ObservabilityConfig::from_lookup(lookup(&[
            ("TRACE_LOG_STREAM_ARN", "arn:aws:kinesis:eu-west-1:123:stream/s1"),
            ("TRACE_LOG_STREAM_NAME", "s1"),
            ("TRACE_LOG_REGION", "eu-west-1"),
            ("TRACE_LOG_ENDPOINT", "https://ingest.example.com"),
            ("TRACE_LOG_MAX_BATCH_SIZE", "25"),
        ]));

        assert!(config.enabled);
        assert!(config.is_valid());
        assert!(config.is_active());
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.endpoint.as_deref(), Some("https://ingest.example.com"));
        assert_eq!(config.max_batch_size, 25);
    }

    #[test]
    fn test_enabled_without_stream_name_is_invalid() {
        let config =
            ObservabilityConfig::from_lookup(lookup(&[("TRACE_LOG_STREAM_ARN", "arn:stream")]));
        assert!(config.enabled);
        assert!(!config.is_valid());
        assert!(!config.is_active());

        let mut explicit = ObservabilityConfig::for_stream("arn:stream", "");
        assert!(!explicit.is_valid());
        explicit.stream_name = None;
        assert!(!explicit.is_valid());
    }

    #[test]
    fn test_bad_batch_size_falls_back_to_default() {
        for raw in ["zero", "0", "-3"] {
            let config =
                ObservabilityConfig::from_lookup(lookup(&[("TRACE_LOG_MAX_BATCH_SIZE", raw)]));
            assert_eq!(config.max_batch_size, 100);
        }
    }

    #[test]
    fn test_get_config_memoizes_until_reset() {
        let first = get_config();
        let second = get_config();
        assert_eq!(first, second);

        reset_config();
        let reloaded = get_config();
        assert_eq!(first, reloaded);
    }

    #[test]
    fn test_concurrent_readers_share_one_memo() {
        let expected = get_config();

        let readers: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| get_config()).collect::<Vec<_>>()))
            .collect();

        for reader in readers {
            for config in reader.join().unwrap() {
                assert_eq!(config, expected);
            }
        }
    }
}
