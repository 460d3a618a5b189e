// Model pricing
//
// Turn cost is a pure function of the model and the four usage counters.
// Rates are expressed in USD per million tokens.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PricingError;
use crate::usage::TokenCounts;

/// Trait for the pricing lookup
///
/// Implementations must be pure: the same model and counts always price the
/// same, and no counter increase may lower the price.
pub trait PricingTable: Send + Sync {
    /// Price in USD of a turn on `model` with the given usage
    fn price(&self, model: &str, tokens: &TokenCounts) -> f64;
}

/// Per-million-token rates for a model (USD)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
    /// Cache read rate; billed at the input rate when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<f64>,
    /// Cache write rate; billed at the input rate when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<f64>,
}

impl ModelPricing {
    pub fn new(input: f64, output: f64) -> Self {
        Self {
            input,
            output,
            cache_read: None,
            cache_write: None,
        }
    }

    pub fn with_cache_rates(mut self, cache_read: f64, cache_write: f64) -> Self {
        self.cache_read = Some(cache_read);
        self.cache_write = Some(cache_write);
        self
    }

    fn validate(&self, model: &str) -> Result<(), PricingError> {
        let rates = [
            ("input", Some(self.input)),
            ("output", Some(self.output)),
            ("cache_read", self.cache_read),
            ("cache_write", self.cache_write),
        ];
        for (name, rate) in rates {
            if let Some(rate) = rate {
                if !rate.is_finite() || rate < 0.0 {
                    return Err(PricingError::InvalidRate {
                        model: model.to_string(),
                        reason: format!("{} rate must be a non-negative number", name),
                    });
                }
            }
        }
        Ok(())
    }

    fn cost(&self, tokens: &TokenCounts) -> f64 {
        let per_token = |rate: f64, count: u64| rate * count as f64 / 1_000_000.0;

        per_token(self.input, tokens.input)
            + per_token(self.output, tokens.output)
            + per_token(self.cache_read.unwrap_or(self.input), tokens.cache_read)
            + per_token(self.cache_write.unwrap_or(self.input), tokens.cache_write)
    }
}

#[derive(Debug, Deserialize)]
struct PricingDocument {
    #[serde(default)]
    default: Option<ModelPricing>,
    #[serde(default)]
    models: HashMap<String, ModelPricing>,
}

/// Fixed rate table keyed by model name
#[derive(Debug, Clone, Default)]
pub struct StaticPricingTable {
    models: HashMap<String, ModelPricing>,
    default: Option<ModelPricing>,
}

impl StaticPricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rates for a model
    pub fn with_model(
        mut self,
        model: impl Into<String>,
        pricing: ModelPricing,
    ) -> Result<Self, PricingError> {
        let model = model.into();
        pricing.validate(&model)?;
        self.models.insert(model, pricing);
        Ok(self)
    }

    /// Rates used for models missing from the table
    pub fn with_default(mut self, pricing: ModelPricing) -> Result<Self, PricingError> {
        pricing.validate("default")?;
        self.default = Some(pricing);
        Ok(self)
    }

    /// Load a table from JSON:
    ///
    /// ```json
    /// {"default": {"input": 3.0, "output": 15.0},
    ///  "models": {"claude-v3-haiku": {"input": 0.25, "output": 1.25}}}
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, PricingError> {
        let doc: PricingDocument = serde_json::from_str(json)?;

        let mut table = Self::new();
        for (model, pricing) in doc.models {
            table = table.with_model(model, pricing)?;
        }
        if let Some(default) = doc.default {
            table = table.with_default(default)?;
        }
        Ok(table)
    }

    pub fn rates(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model).or(self.default.as_ref())
    }
}

impl PricingTable for StaticPricingTable {
    fn price(&self, model: &str, tokens: &TokenCounts) -> f64 {
        match self.rates(model) {
            Some(pricing) => pricing.cost(tokens),
            None => {
                warn!(model = %model, "No pricing configured for model, reporting zero cost");
                0.0
            }
        }
    }
}
