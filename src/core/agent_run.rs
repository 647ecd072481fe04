//! Executing a run against a model provider
//!
//! Library entry point for embedders that bring their own [`ModelProvider`].

use std::time::Instant;

use serde_json::json;
use thiserror::Error;

use super::error::TraceError;
use super::trace_store::TraceStore;
use crate::data::{NewStep, Run, RunStatus, RunUpdate, StepType};
use crate::provider::{ModelProvider, ProviderConfig, ProviderError, TokenUsage};

#[derive(Debug, Error)]
pub enum AgentRunError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("Run {run_id} failed: {source}")]
    Provider {
        run_id: i64,
        #[source]
        source: ProviderError,
    },
}

impl AgentRunError {
    /// The run the failure was recorded on, if one was created
    pub fn run_id(&self) -> Option<i64> {
        match self {
            AgentRunError::Provider { run_id, .. } => Some(*run_id),
            AgentRunError::Trace(_) => None,
        }
    }
}

/// Run one prompt through a provider, tracing every stage.
///
/// A provider failure is recorded as an `error` step and a `failed` run
/// before being returned to the caller.
pub async fn run_with_provider(
    store: &TraceStore,
    provider: &dyn ModelProvider,
    agent_name: &str,
    prompt: &str,
    config: &ProviderConfig,
) -> Result<Run, AgentRunError> {
    let run = store.create_run(agent_name, prompt)?;
    let provider_name = provider.name().to_string();

    let started = Instant::now();
    let result = provider.call(prompt, config).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(reply) => {
            let usage = reply.usage.as_ref().and_then(TokenUsage::from_usage);
            let tokens = usage.map(|u| u.total()).unwrap_or(0);
            let cost = match (config.pricing, usage) {
                (Some(pricing), Some(usage)) => pricing.calculate_cost(usage.input, usage.output),
                _ => 0.0,
            };

            let step = NewStep::new(StepType::LlmCall)
                .with_name(format!("{provider_name}_call"))
                .with_input(json!({
                    "provider": provider_name,
                    "model": config.model,
                    "temperature": config.temperature,
                    "max_tokens": config.max_tokens,
                    "prompt": prompt,
                }))
                .with_output(json!({
                    "text": reply.text,
                    "usage": reply.usage,
                    "raw": reply.raw,
                }))
                .with_latency_ms(latency_ms)
                .with_cost(cost, tokens);
            store.append_step(run.id, step)?;

            let update = RunUpdate::status(RunStatus::Success)
                .with_final_output(reply.text)
                .with_totals(tokens, cost);
            let run = store.update_run(run.id, update)?;
            tracing::info!(run_id = run.id, provider = %provider_name, tokens, "Provider run succeeded");
            Ok(run)
        }
        Err(error) => {
            let message = error.to_string();
            let step = NewStep::new(StepType::Error)
                .with_name(format!("{provider_name}_error"))
                .with_input(json!({
                    "provider": provider_name,
                    "model": config.model,
                }))
                .with_latency_ms(latency_ms)
                .with_error_message(message.clone());
            store.append_step(run.id, step)?;
            store.update_run(
                run.id,
                RunUpdate::status(RunStatus::Failed).with_error_message(message),
            )?;

            tracing::warn!(run_id = run.id, provider = %provider_name, error = %error, "Provider run failed");
            Err(AgentRunError::Provider {
                run_id: run.id,
                source: error,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Database;
    use crate::events::ChannelHub;
    use crate::provider::{Pricing, ProviderReply};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ScriptedProvider {
        reply: Option<ProviderReply>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn call(
            &self,
            _prompt: &str,
            _config: &ProviderConfig,
        ) -> Result<ProviderReply, ProviderError> {
            self.reply.clone().ok_or(ProviderError::Upstream {
                status: 503,
                message: "overloaded".to_string(),
            })
        }
    }

    fn store() -> TraceStore {
        TraceStore::new(
            Database::open_in_memory().unwrap(),
            Arc::new(ChannelHub::default()),
        )
    }

    #[tokio::test]
    async fn test_success_records_llm_call() {
        let store = store();
        let provider = ScriptedProvider {
            reply: Some(ProviderReply {
                text: "4".to_string(),
                usage: Some(json!({"input_tokens": 1000, "output_tokens": 10})),
                raw: json!({"id": "msg_1"}),
            }),
        };
        let config = ProviderConfig::default().with_model("m").with_pricing(Pricing {
            input_cost_per_million: 1.0,
            output_cost_per_million: 2.0,
        });

        let run = run_with_provider(&store, &provider, "api-agent", "What is 2+2?", &config)
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.final_output.as_deref(), Some("4"));
        assert_eq!(run.total_tokens, 1010);
        assert!(run.total_cost_usd > 0.0);

        let steps = store.get_run(run.id).unwrap().steps;
        let kinds: Vec<_> = steps.iter().map(|s| s.step_type).collect();
        assert_eq!(kinds, vec![StepType::UserInput, StepType::LlmCall]);
        let output = steps[1].output.as_ref().unwrap();
        assert_eq!(output["text"], "4");
        assert_eq!(output["raw"]["id"], "msg_1");
        assert!(steps[1].latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_then_propagated() {
        let store = store();
        let provider = ScriptedProvider { reply: None };

        let err = run_with_provider(&store, &provider, "api-agent", "hi", &ProviderConfig::default())
            .await
            .unwrap_err();
        let run_id = err.run_id().unwrap();
        assert!(matches!(err, AgentRunError::Provider { .. }));

        let detail = store.get_run(run_id).unwrap();
        assert_eq!(detail.run.status, RunStatus::Failed);
        let message = detail.run.error_message.clone().unwrap();
        assert!(message.contains("overloaded"));

        let last = detail.steps.last().unwrap();
        assert_eq!(last.step_type, StepType::Error);
        assert_eq!(last.name.as_deref(), Some("scripted_error"));
        assert_eq!(last.error_message.as_deref(), Some(message.as_str()));
    }
}
