//! Data models for runs, steps, and evals

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

/// Returned when a stored or submitted enum label is not recognized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Replayed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Replayed => "replayed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl FromStr for RunStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            "replayed" => Ok(RunStatus::Replayed),
            other => Err(UnknownVariant {
                kind: "run status",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a run was recorded from a live execution or derived by replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOrigin {
    Original,
    Replay,
}

impl RunOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOrigin::Original => "original",
            RunOrigin::Replay => "replay",
        }
    }

    /// Terminal statuses a run of this origin may settle in.
    pub fn allows_terminal(&self, status: RunStatus) -> bool {
        match self {
            RunOrigin::Original => matches!(status, RunStatus::Success | RunStatus::Failed),
            RunOrigin::Replay => status.is_terminal(),
        }
    }
}

impl FromStr for RunOrigin {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(RunOrigin::Original),
            "replay" => Ok(RunOrigin::Replay),
            other => Err(UnknownVariant {
                kind: "run origin",
                value: other.to_string(),
            }),
        }
    }
}

/// Kind of event recorded in a run's trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    UserInput,
    LlmCall,
    ToolCall,
    Retrieval,
    AgentLog,
    Error,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::UserInput => "user_input",
            StepType::LlmCall => "llm_call",
            StepType::ToolCall => "tool_call",
            StepType::Retrieval => "retrieval",
            StepType::AgentLog => "agent_log",
            StepType::Error => "error",
        }
    }
}

impl FromStr for StepType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_input" => Ok(StepType::UserInput),
            "llm_call" => Ok(StepType::LlmCall),
            "tool_call" => Ok(StepType::ToolCall),
            "retrieval" => Ok(StepType::Retrieval),
            "agent_log" => Ok(StepType::AgentLog),
            "error" => Ok(StepType::Error),
            other => Err(UnknownVariant {
                kind: "step type",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent execution attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: i64,
    pub agent_name: String,
    pub input_prompt: String,
    pub final_output: Option<String>,
    pub total_tokens: i64,
    pub total_cost_usd: f64,
    pub status: RunStatus,
    pub origin: RunOrigin,
    pub error_message: Option<String>,
    /// Latest evaluation snapshot, mirrored from the newest eval row
    pub eval_provider: Option<String>,
    pub eval_scores: Option<Map<String, Value>>,
    pub eval_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A run together with its ordered trace
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run: Run,
    pub steps: Vec<Step>,
}

/// Partial update applied to a run. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RunUpdate {
    pub status: Option<RunStatus>,
    pub final_output: Option<String>,
    pub total_tokens: Option<i64>,
    pub total_cost_usd: Option<f64>,
    pub error_message: Option<String>,
}

impl RunUpdate {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_final_output(mut self, output: impl Into<String>) -> Self {
        self.final_output = Some(output.into());
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_totals(mut self, tokens: i64, cost_usd: f64) -> Self {
        self.total_tokens = Some(tokens);
        self.total_cost_usd = Some(cost_usd);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One immutable recorded event within a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: i64,
    pub run_id: i64,
    pub step_type: StepType,
    pub name: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub latency_ms: Option<f64>,
    pub cost_usd: Option<f64>,
    pub tokens: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending a step
#[derive(Debug, Clone, PartialEq)]
pub struct NewStep {
    pub step_type: StepType,
    pub name: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub latency_ms: Option<f64>,
    pub cost_usd: Option<f64>,
    pub tokens: Option<i64>,
    pub error_message: Option<String>,
}

impl NewStep {
    pub fn new(step_type: StepType) -> Self {
        Self {
            step_type,
            name: None,
            input: None,
            output: None,
            latency_ms: None,
            cost_usd: None,
            tokens: None,
            error_message: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_cost(mut self, cost_usd: f64, tokens: i64) -> Self {
        self.cost_usd = Some(cost_usd);
        self.tokens = Some(tokens);
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Copy every recorded attribute of an existing step except identity and timestamp.
    pub fn cloned_from(step: &Step) -> Self {
        Self {
            step_type: step.step_type,
            name: step.name.clone(),
            input: step.input.clone(),
            output: step.output.clone(),
            latency_ms: step.latency_ms,
            cost_usd: step.cost_usd,
            tokens: step.tokens,
            error_message: step.error_message.clone(),
        }
    }
}

/// An appended scoring record for a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Eval {
    pub id: i64,
    pub run_id: i64,
    pub provider: String,
    pub status: String,
    pub scores: Map<String, Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when recording an eval
#[derive(Debug, Clone, PartialEq)]
pub struct NewEval {
    pub provider: String,
    pub status: String,
    pub scores: Map<String, Value>,
    pub notes: Option<String>,
}

/// Current time truncated to the precision stored in the database.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC3339 so that text ordering in SQLite matches time ordering.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trips_through_labels() {
        for status in [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Failed,
            RunStatus::Replayed,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!("done".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_unknown_step_type_is_rejected() {
        let err = "thought".parse::<StepType>().unwrap_err();
        assert_eq!(err.kind, "step type");
        assert_eq!(err.to_string(), "unknown step type: thought");
    }

    #[test]
    fn test_origin_terminal_rules() {
        assert!(RunOrigin::Original.allows_terminal(RunStatus::Success));
        assert!(RunOrigin::Original.allows_terminal(RunStatus::Failed));
        assert!(!RunOrigin::Original.allows_terminal(RunStatus::Replayed));
        assert!(RunOrigin::Replay.allows_terminal(RunStatus::Replayed));
        assert!(RunOrigin::Replay.allows_terminal(RunStatus::Failed));
        assert!(!RunOrigin::Replay.allows_terminal(RunStatus::Running));
    }

    #[test]
    fn test_timestamp_format_sorts_lexicographically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        let a = format_timestamp(&early);
        let b = format_timestamp(&late);
        assert_eq!(a, "2024-01-01T09:00:00.000000Z");
        assert!(a < b);
    }

    #[test]
    fn test_step_type_serializes_snake_case() {
        let json = serde_json::to_string(&StepType::LlmCall).unwrap();
        assert_eq!(json, "\"llm_call\"");
    }
}
