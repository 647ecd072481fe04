//! Model provider boundary.
//!
//! Providers are stateless request/response wrappers around an LLM API. They
//! do no retrying; failures are recorded on the run by the caller.
//!
//! No concrete client ships with the crate. Embedders implement
//! [`ModelProvider`] and drive it through [`crate::core::run_with_provider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Per-million-token pricing used to cost a call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl Pricing {
    /// Calculate cost for given token usage
    pub fn calculate_cost(&self, input_tokens: i64, output_tokens: i64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }
}

/// Options passed through to a provider call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
}

impl ProviderConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = Some(pricing);
        self
    }
}

/// Successful provider response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderReply {
    pub text: String,
    /// Provider-specific usage block, recorded as returned
    pub usage: Option<Value>,
    pub raw: Value,
}

/// Token counts read from a usage block in any of the common shapes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
}

impl TokenUsage {
    pub fn from_usage(usage: &Value) -> Option<Self> {
        let field = |key: &str| usage.get(key).and_then(Value::as_i64);

        let input = field("input_tokens").or_else(|| field("prompt_tokens"));
        let output = field("output_tokens").or_else(|| field("completion_tokens"));
        match (input, output, field("total_tokens")) {
            (None, None, None) => None,
            (None, None, Some(total)) => Some(Self {
                input: total,
                output: 0,
            }),
            (input, output, _) => Some(Self {
                input: input.unwrap_or(0),
                output: output.unwrap_or(0),
            }),
        }
    }

    pub fn total(&self) -> i64 {
        self.input + self.output
    }
}

/// A model API that turns a prompt into text
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Short identifier recorded in step names, e.g. `openai`
    fn name(&self) -> &str;

    async fn call(
        &self,
        prompt: &str,
        config: &ProviderConfig,
    ) -> Result<ProviderReply, ProviderError>;
}
