// Model settings
//
// Deployment-wide model selection, loaded from environment variables:
// - `GLOBAL_AVAILABLE_MODELS`: JSON array of allowed model names
//   (unset, empty or malformed means every model is allowed)
// - `DEFAULT_MODEL`: model used when a request does not name one

use std::env;

use tracing::{error, info};

const FALLBACK_DEFAULT_MODEL: &str = "claude-v3.7-sonnet";

/// Deployment-wide model selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Allowed models; empty means all models are allowed
    pub available_models: Vec<String>,
    pub default_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            available_models: Vec::new(),
            default_model: FALLBACK_DEFAULT_MODEL.to_string(),
        }
    }
}

impl ModelSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let available_models = lookup("GLOBAL_AVAILABLE_MODELS")
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_available_models(&raw))
            .unwrap_or_default();

        let default_model =
            non_blank("DEFAULT_MODEL").unwrap_or_else(|| FALLBACK_DEFAULT_MODEL.to_string());

        Self {
            available_models,
            default_model,
        }
    }

    /// Whether `model` may be used
    pub fn is_available(&self, model: &str) -> bool {
        self.available_models.is_empty() || self.available_models.iter().any(|m| m == model)
    }

    /// The requested model, or the default model when the request is blank
    pub fn resolve<'a>(&'a self, requested: &'a str) -> &'a str {
        let requested = requested.trim();
        if requested.is_empty() {
            &self.default_model
        } else {
            requested
        }
    }
}

fn parse_available_models(raw: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => {
            let models: Vec<String> = items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) if !s.is_empty() => Some(s),
                    _ => None,
                })
                .collect();
            info!(models = ?models, "Global available models configured");
            models
        }
        Ok(other) => {
            error!(value = %other, "GLOBAL_AVAILABLE_MODELS must be a JSON array");
            Vec::new()
        }
        Err(e) => {
            error!(error = %e, "Failed to parse GLOBAL_AVAILABLE_MODELS as JSON");
            Vec::new()
        }
    }
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
    fn test_defaults_when_unset() {
        let settings = ModelSettings::from_lookup(lookup(&[]));
        assert_eq!(settings, ModelSettings::default());
        assert!(settings.is_available("anything"));
    }

    #[test]
    fn test_available_models_filters_non_strings() {
        let settings = ModelSettings::from_lookup(lookup(&[(
            "GLOBAL_AVAILABLE_MODELS",
            r#"["claude-v3-haiku", "", 42, null, "claude-v3.7-sonnet"]"#,
        )]));
        assert_eq!(
            settings.available_models,
            vec!["claude-v3-haiku", "claude-v3.7-sonnet"]
        );
        assert!(settings.is_available("claude-v3-haiku"));
        assert!(!settings.is_available("mistral-large"));
    }

    #[test]
    fn test_malformed_available_models_allows_all() {
        let settings =
            ModelSettings::from_lookup(lookup(&[("GLOBAL_AVAILABLE_MODELS", "not json")]));
        assert!(settings.available_models.is_empty());

        let settings =
            ModelSettings::from_lookup(lookup(&[("GLOBAL_AVAILABLE_MODELS", r#"{"a": 1}"#)]));
        assert!(settings.available_models.is_empty());
    }

    #[test]
    fn test_default_model_is_trimmed() {
        let settings = ModelSettings::from_lookup(lookup(&[("DEFAULT_MODEL", " nova-pro ")]));
        assert_eq!(settings.default_model, "nova-pro");
        assert_eq!(settings.resolve(""), "nova-pro");

        let settings = ModelSettings::from_lookup(lookup(&[("DEFAULT_MODEL", "   ")]));
        assert_eq!(settings.default_model, "claude-v3.7-sonnet");
    }

    #[test]
    fn test_resolve_blank_request() {
        let settings = ModelSettings::default();
        assert_eq!(settings.resolve("  "), "claude-v3.7-sonnet");
        assert_eq!(settings.resolve("nova-pro"), "nova-pro");
    }
}
