use std::sync::Arc;

use thiserror::Error;

use super::registry::ExecutorRegistry;
use crate::core::{TraceError, TraceStore};
use crate::data::{NewStep, Run, RunDetail, RunStatus, RunUpdate};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Source run {0} not found")]
    SourceNotFound(i64),

    #[error("Executor for '{agent_name}' failed on run {run_id}: {source}")]
    Executor {
        agent_name: String,
        run_id: i64,
        #[source]
        source: TraceError,
    },

    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Produces a new run from an existing one.
///
/// Agents with a registered executor are re-executed; anything else has its
/// recorded trace copied verbatim.
#[derive(Clone)]
pub struct ReplayEngine {
    store: TraceStore,
    registry: Arc<ExecutorRegistry>,
}

impl ReplayEngine {
    pub fn new(store: TraceStore, registry: Arc<ExecutorRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    /// Replay `source_run_id` into a fresh run and return that run.
    pub async fn replay(&self, source_run_id: i64) -> Result<Run, ReplayError> {
        let source = match self.store.get_run(source_run_id) {
            Ok(detail) => detail,
            Err(TraceError::RunNotFound(id)) => return Err(ReplayError::SourceNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        let derived = self.store.create_derived_run(&source.run)?;

        match self.registry.get(&source.run.agent_name) {
            Some(executor) => {
                tracing::info!(
                    source_run_id,
                    run_id = derived.id,
                    agent = %source.run.agent_name,
                    "Replaying with registered executor"
                );
                if let Err(source_err) = executor.execute(&self.store, &derived).await {
                    self.mark_failed(&derived, &source_err);
                    return Err(ReplayError::Executor {
                        agent_name: source.run.agent_name,
                        run_id: derived.id,
                        source: source_err,
                    });
                }
                Ok(self.store.find_run(derived.id)?)
            }
            None => {
                tracing::info!(
                    source_run_id,
                    run_id = derived.id,
                    steps = source.steps.len(),
                    "No executor registered; cloning recorded steps"
                );
                match self.clone_trace(&source, &derived) {
                    Ok(run) => Ok(run),
                    Err(e) => {
                        self.mark_failed(&derived, &e);
                        Err(e.into())
                    }
                }
            }
        }
    }

    fn clone_trace(&self, source: &RunDetail, derived: &Run) -> Result<Run, TraceError> {
        let steps: Vec<NewStep> = source.steps.iter().map(NewStep::cloned_from).collect();
        self.store.append_steps(derived.id, steps)?;

        let mut update = RunUpdate::status(RunStatus::Replayed)
            .with_totals(source.run.total_tokens, source.run.total_cost_usd);
        update.final_output = source.run.final_output.clone();
        update.error_message = source.run.error_message.clone();
        if update.final_output.is_none()
            && update.error_message.as_deref().map_or(true, |m| m.trim().is_empty())
        {
            update.error_message = Some(format!(
                "source run {} had no final output when replayed",
                source.run.id
            ));
        }
        self.store.update_run(derived.id, update)
    }

    /// Settle a derived run the executor left running.
    fn mark_failed(&self, derived: &Run, err: &TraceError) {
        let still_running = matches!(
            self.store.find_run(derived.id),
            Ok(run) if run.status == RunStatus::Running
        );
        if !still_running {
            return;
        }
        let update = RunUpdate::status(RunStatus::Failed).with_error_message(err.to_string());
        if let Err(e) = self.store.update_run(derived.id, update) {
            tracing::warn!(run_id = derived.id, error = %e, "Failed to mark replay run as failed");
        }
    }
}
