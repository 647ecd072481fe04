//! Deterministic demo agent: user input, a fake model call, a clock tool.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

use super::registry::ReplayExecutor;
use crate::core::{TraceError, TraceStore};
use crate::data::{NewStep, Run, RunStatus, RunUpdate, StepType};

pub const DEMO_AGENT_NAME: &str = "demo-agent";
pub const DEMO_PROMPT: &str = "Find the current date and format it as ISO.";

/// Scripted agent that answers with the current time.
///
/// With a fixed clock every execution records identical steps, which makes
/// it usable as a replay executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoAgent {
    clock: Option<DateTime<Utc>>,
}

impl DemoAgent {
    /// Agent reading the wall clock on every run
    pub fn live() -> Self {
        Self { clock: None }
    }

    pub fn with_fixed_clock(clock: DateTime<Utc>) -> Self {
        Self { clock: Some(clock) }
    }

    fn timestamp(&self) -> String {
        self.clock
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn script(prompt: &str, answer: &str) -> Vec<NewStep> {
        vec![
            NewStep::new(StepType::LlmCall)
                .with_name("fake_llm")
                .with_input(json!({ "prompt": prompt }))
                .with_output(json!({ "text": answer }))
                .with_cost(0.0, 0),
            NewStep::new(StepType::ToolCall)
                .with_name("clock")
                .with_output(json!({ "utc": answer }))
                .with_cost(0.0, 0),
        ]
    }

    /// Record a fresh demo run from start to `success`.
    pub fn run(&self, store: &TraceStore) -> Result<Run, TraceError> {
        let run = store.create_run(DEMO_AGENT_NAME, DEMO_PROMPT)?;
        let answer = self.timestamp();
        store.append_steps(run.id, Self::script(DEMO_PROMPT, &answer))?;
        store.update_run(
            run.id,
            RunUpdate::status(RunStatus::Success).with_final_output(answer),
        )
    }
}

#[async_trait]
impl ReplayExecutor for DemoAgent {
    async fn execute(&self, store: &TraceStore, run: &Run) -> Result<(), TraceError> {
        let answer = self.timestamp();
        let mut steps = vec![NewStep::new(StepType::UserInput)
            .with_name("user_input")
            .with_input(json!({ "prompt": run.input_prompt }))
            .with_cost(0.0, 0)];
        steps.extend(Self::script(&run.input_prompt, &answer));

        store.append_steps(run.id, steps)?;
        store.update_run(
            run.id,
            RunUpdate::status(RunStatus::Replayed).with_final_output(answer),
        )?;
        Ok(())
    }
}
