//! Run and step lifecycle on top of the SQLite stores.
//!
//! Every mutation happens in a single transaction. Steps are published to
//! live viewers only after their transaction commits.

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::{json, Value};

use super::error::TraceError;
use crate::data::{
    now, Database, Eval, EvalStore, NewEval, NewStep, Run, RunDetail, RunOrigin, RunStatus,
    RunStore, RunUpdate, Step, StepStore, StepType,
};
use crate::events::EventPublisher;

/// Longest agent name accepted from callers
pub const MAX_AGENT_NAME_LEN: usize = 200;

/// Upper bound on a single `list_runs` page
pub const MAX_PAGE_SIZE: u32 = 500;

/// Records runs, their ordered steps, and eval history.
#[derive(Clone)]
pub struct TraceStore {
    db: Database,
    runs: RunStore,
    steps: StepStore,
    evals: EvalStore,
    publisher: Arc<dyn EventPublisher>,
}

impl TraceStore {
    pub fn new(db: Database, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            runs: RunStore::new(db.clone()),
            steps: StepStore::new(db.clone()),
            evals: EvalStore::new(db.clone()),
            db,
            publisher,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn step_store(&self) -> &StepStore {
        &self.steps
    }

    pub fn eval_store(&self) -> &EvalStore {
        &self.evals
    }

    /// Start a run and record its `user_input` step in the same transaction.
    pub fn create_run(&self, agent_name: &str, input_prompt: &str) -> Result<Run, TraceError> {
        validate_agent_name(agent_name)?;

        let (run, step) = self.db.with_transaction(|tx| {
            let ts = now();
            let run = RunStore::insert_in(tx, agent_name, input_prompt, RunOrigin::Original, ts)?;
            let initial = NewStep::new(StepType::UserInput)
                .with_name("user_input")
                .with_input(json!({ "prompt": input_prompt }));
            let step = StepStore::insert_in(tx, run.id, &initial, ts)?;
            Ok::<_, TraceError>((run, step))
        })?;

        tracing::info!(run_id = run.id, agent = %run.agent_name, "Created run");
        self.publisher.publish(&step);
        Ok(run)
    }

    /// Start a replay-derived run. The executor records every step itself.
    pub(crate) fn create_derived_run(&self, source: &Run) -> Result<Run, TraceError> {
        let name = format!("{} (replay)", source.agent_name);
        let run = self.db.with_connection(|conn| {
            RunStore::insert_in(conn, &name, &source.input_prompt, RunOrigin::Replay, now())
        })?;
        tracing::info!(run_id = run.id, source_run_id = source.id, "Created replay run");
        Ok(run)
    }

    /// Append one step to a run and publish it.
    pub fn append_step(&self, run_id: i64, step: NewStep) -> Result<Step, TraceError> {
        validate_step(&step)?;

        let step = self
            .db
            .with_transaction(|tx| Self::insert_step_in(tx, run_id, &step))?;

        tracing::debug!(run_id, step_id = step.id, step_type = %step.step_type, "Appended step");
        self.publisher.publish(&step);
        Ok(step)
    }

    /// Append several steps atomically, preserving their order.
    pub fn append_steps(&self, run_id: i64, steps: Vec<NewStep>) -> Result<Vec<Step>, TraceError> {
        for step in &steps {
            validate_step(step)?;
        }

        let recorded = self.db.with_transaction(|tx| {
            steps
                .iter()
                .map(|step| Self::insert_step_in(tx, run_id, step))
                .collect::<Result<Vec<_>, TraceError>>()
        })?;

        tracing::debug!(run_id, count = recorded.len(), "Appended steps");
        for step in &recorded {
            self.publisher.publish(step);
        }
        Ok(recorded)
    }

    fn insert_step_in(conn: &Connection, run_id: i64, step: &NewStep) -> Result<Step, TraceError> {
        if RunStore::get_in(conn, run_id)?.is_none() {
            return Err(TraceError::RunNotFound(run_id));
        }
        // Never let a skewed clock place a step before its predecessor.
        let mut created_at = now();
        if let Some(latest) = StepStore::latest_created_at_in(conn, run_id)? {
            created_at = created_at.max(latest);
        }
        Ok(StepStore::insert_in(conn, run_id, step, created_at)?)
    }

    /// Apply a partial update, enforcing the status state machine.
    pub fn update_run(&self, run_id: i64, update: RunUpdate) -> Result<Run, TraceError> {
        if matches!(update.total_tokens, Some(tokens) if tokens < 0) {
            return Err(TraceError::validation("total_tokens must be non-negative"));
        }
        if let Some(cost) = update.total_cost_usd {
            if !(cost >= 0.0 && cost.is_finite()) {
                return Err(TraceError::validation(
                    "total_cost_usd must be a non-negative number",
                ));
            }
        }

        let run = self.db.with_transaction(|tx| {
            let mut run = RunStore::get_in(tx, run_id)?.ok_or(TraceError::RunNotFound(run_id))?;

            if let Some(next) = update.status {
                check_transition(&run, next)?;
                run.status = next;
            }
            if let Some(output) = update.final_output {
                run.final_output = Some(output);
            }
            if let Some(tokens) = update.total_tokens {
                run.total_tokens = tokens;
            }
            if let Some(cost) = update.total_cost_usd {
                run.total_cost_usd = cost;
            }
            if let Some(message) = update.error_message {
                run.error_message = Some(message);
            }
            check_outcome_recorded(&run)?;

            run.updated_at = now();
            RunStore::update_in(tx, &run)?;
            Ok::<_, TraceError>(run)
        })?;

        tracing::info!(run_id, status = %run.status, "Updated run");
        Ok(run)
    }

    /// A run with its steps in trace order
    pub fn get_run(&self, run_id: i64) -> Result<RunDetail, TraceError> {
        self.db.with_transaction(|tx| {
            let run = RunStore::get_in(tx, run_id)?.ok_or(TraceError::RunNotFound(run_id))?;
            let steps = StepStore::list_for_run_in(tx, run_id)?;
            Ok(RunDetail { run, steps })
        })
    }

    /// The run row alone, without loading its trace
    pub fn find_run(&self, run_id: i64) -> Result<Run, TraceError> {
        self.runs
            .get_by_id(run_id)?
            .ok_or(TraceError::RunNotFound(run_id))
    }

    /// Runs newest first
    pub fn list_runs(&self, limit: u32, offset: u32) -> Result<Vec<Run>, TraceError> {
        Ok(self.runs.list(limit.min(MAX_PAGE_SIZE), offset)?)
    }

    /// Delete a run together with its steps and evals.
    pub fn delete_run(&self, run_id: i64) -> Result<(), TraceError> {
        let removed = self
            .db
            .with_connection(|conn| RunStore::delete_in(conn, run_id))?;
        if !removed {
            return Err(TraceError::RunNotFound(run_id));
        }
        tracing::info!(run_id, "Deleted run");
        Ok(())
    }

    /// Eval history for a run, oldest first
    pub fn list_evals(&self, run_id: i64) -> Result<Vec<Eval>, TraceError> {
        self.find_run(run_id)?;
        Ok(self.evals.list_for_run(run_id)?)
    }

    /// Append an eval and mirror it into the run's snapshot in one transaction.
    pub fn record_eval(&self, run_id: i64, eval: NewEval) -> Result<Eval, TraceError> {
        let eval = self.db.with_transaction(|tx| {
            if RunStore::get_in(tx, run_id)?.is_none() {
                return Err(TraceError::RunNotFound(run_id));
            }
            let ts = now();
            let recorded = EvalStore::insert_in(tx, run_id, &eval, ts)?;
            RunStore::set_eval_snapshot_in(
                tx,
                run_id,
                &recorded.provider,
                &recorded.scores,
                &recorded.status,
                ts,
            )?;
            Ok(recorded)
        })?;

        tracing::info!(run_id, eval_id = eval.id, provider = %eval.provider, "Recorded eval");
        Ok(eval)
    }
}

impl std::fmt::Debug for TraceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceStore").field("db", &self.db).finish()
    }
}

fn validate_agent_name(agent_name: &str) -> Result<(), TraceError> {
    if agent_name.trim().is_empty() {
        return Err(TraceError::validation("agent_name must not be empty"));
    }
    if agent_name.chars().count() > MAX_AGENT_NAME_LEN {
        return Err(TraceError::validation(format!(
            "agent_name must be at most {MAX_AGENT_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_step(step: &NewStep) -> Result<(), TraceError> {
    for (field, value) in [("input", &step.input), ("output", &step.output)] {
        if matches!(value, Some(v) if !matches!(v, Value::Object(_))) {
            return Err(TraceError::validation(format!(
                "{field} must be a JSON object"
            )));
        }
    }
    for (field, value) in [("latency_ms", step.latency_ms), ("cost_usd", step.cost_usd)] {
        if matches!(value, Some(v) if !(v >= 0.0 && v.is_finite())) {
            return Err(TraceError::validation(format!(
                "{field} must be a non-negative number"
            )));
        }
    }
    if matches!(step.tokens, Some(tokens) if tokens < 0) {
        return Err(TraceError::validation("tokens must be non-negative"));
    }
    Ok(())
}

/// Status only moves forward: running to a terminal status the run's origin allows.
fn check_transition(run: &Run, next: RunStatus) -> Result<(), TraceError> {
    if run.status == next {
        return Ok(());
    }
    if run.status.is_terminal() || !run.origin.allows_terminal(next) {
        return Err(TraceError::InvalidTransition {
            run_id: run.id,
            from: run.status,
            to: next,
        });
    }
    Ok(())
}

/// A finished run must say what happened.
fn check_outcome_recorded(run: &Run) -> Result<(), TraceError> {
    let has_output = run.final_output.is_some();
    let has_error = run
        .error_message
        .as_deref()
        .is_some_and(|message| !message.trim().is_empty());

    match run.status {
        RunStatus::Running => Ok(()),
        RunStatus::Success if !has_output => Err(TraceError::validation(
            "a successful run requires final_output",
        )),
        RunStatus::Failed if !has_error => Err(TraceError::validation(
            "a failed run requires a non-empty error_message",
        )),
        RunStatus::Replayed if !has_output && !has_error => Err(TraceError::validation(
            "a replayed run requires final_output or error_message",
        )),
        _ => Ok(()),
    }
}
