//! Background evaluation queue.
//!
//! Jobs are consumed by a fixed pool of workers. Each job appends one eval
//! row and refreshes the run's snapshot; a missing run produces a failed
//! outcome instead of stopping the worker.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::scorer::Scorer;
use crate::core::{TraceError, TraceStore};
use crate::data::{Eval, NewEval};

/// Completed jobs remembered for status lookups
const MAX_TRACKED_JOBS: usize = 4096;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Evaluation queue is closed")]
    QueueClosed,
}

/// Result of evaluating one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalOutcome {
    pub ok: bool,
    pub run_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalOutcome {
    fn completed(eval: Eval) -> Self {
        Self {
            ok: true,
            run_id: eval.run_id,
            eval_id: Some(eval.id),
            provider: Some(eval.provider),
            scores: Some(eval.scores),
            error: None,
        }
    }

    fn failed(run_id: i64, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            run_id,
            eval_id: None,
            provider: None,
            scores: None,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle of an enqueued job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued { run_id: i64 },
    Completed { outcome: EvalOutcome },
}

/// Score a run and persist the result.
pub fn evaluate_run(store: &TraceStore, scorer: &dyn Scorer, run_id: i64) -> EvalOutcome {
    let run = match store.find_run(run_id) {
        Ok(run) => run,
        Err(TraceError::RunNotFound(_)) => return EvalOutcome::failed(run_id, "run not found"),
        Err(e) => return EvalOutcome::failed(run_id, e.to_string()),
    };

    let card = scorer.score(&run.input_prompt, run.final_output.as_deref());
    let eval = NewEval {
        provider: card.provider,
        status: "success".to_string(),
        scores: card.scores,
        notes: card.notes,
    };

    match store.record_eval(run_id, eval) {
        Ok(eval) => EvalOutcome::completed(eval),
        // Deleted between the read and the write
        Err(TraceError::RunNotFound(_)) => EvalOutcome::failed(run_id, "run not found"),
        Err(e) => EvalOutcome::failed(run_id, e.to_string()),
    }
}

struct EvalJob {
    id: Uuid,
    run_id: i64,
}

#[derive(Default)]
struct JobTable {
    states: HashMap<Uuid, JobState>,
    completed: VecDeque<Uuid>,
}

impl JobTable {
    fn complete(&mut self, id: Uuid, outcome: EvalOutcome) {
        self.states.insert(id, JobState::Completed { outcome });
        self.completed.push_back(id);
        while self.completed.len() > MAX_TRACKED_JOBS {
            if let Some(oldest) = self.completed.pop_front() {
                self.states.remove(&oldest);
            }
        }
    }
}

/// Queue of evaluation jobs served by a worker pool
pub struct EvalDispatcher {
    queue: mpsc::Sender<EvalJob>,
    jobs: Arc<Mutex<JobTable>>,
}

impl EvalDispatcher {
    /// Start `workers` workers. They stop once the dispatcher is dropped and
    /// the queue drains.
    pub fn spawn(
        store: TraceStore,
        scorer: Arc<dyn Scorer>,
        workers: usize,
        queue_capacity: usize,
    ) -> Self {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let jobs = Arc::new(Mutex::new(JobTable::default()));

        for worker in 0..workers.max(1) {
            tokio::spawn(worker_loop(
                worker,
                Arc::clone(&rx),
                store.clone(),
                Arc::clone(&scorer),
                Arc::clone(&jobs),
            ));
        }

        Self { queue, jobs }
    }

    /// Queue a run for evaluation and return the job id.
    pub async fn enqueue(&self, run_id: i64) -> Result<Uuid, DispatchError> {
        let id = Uuid::new_v4();
        self.jobs
            .lock()
            .states
            .insert(id, JobState::Queued { run_id });

        if self.queue.send(EvalJob { id, run_id }).await.is_err() {
            self.jobs.lock().states.remove(&id);
            return Err(DispatchError::QueueClosed);
        }

        tracing::debug!(run_id, job_id = %id, "Queued evaluation");
        Ok(id)
    }

    pub fn job(&self, id: Uuid) -> Option<JobState> {
        self.jobs.lock().states.get(&id).cloned()
    }
}

impl std::fmt::Debug for EvalDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalDispatcher")
            .field("tracked_jobs", &self.jobs.lock().states.len())
            .finish()
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<EvalJob>>>,
    store: TraceStore,
    scorer: Arc<dyn Scorer>,
    jobs: Arc<Mutex<JobTable>>,
) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break;
        };

        let outcome = {
            let store = store.clone();
            let scorer = Arc::clone(&scorer);
            let run_id = job.run_id;
            tokio::task::spawn_blocking(move || evaluate_run(&store, scorer.as_ref(), run_id)).await
        };
        let outcome = outcome.unwrap_or_else(|e| {
            tracing::error!(worker, run_id = job.run_id, error = %e, "Evaluation task panicked");
            EvalOutcome::failed(job.run_id, "evaluation task panicked")
        });

        if outcome.ok {
            tracing::info!(worker, run_id = job.run_id, job_id = %job.id, "Evaluation completed");
        } else {
            tracing::warn!(
                worker,
                run_id = job.run_id,
                job_id = %job.id,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Evaluation failed"
            );
        }
        jobs.lock().complete(job.id, outcome);
    }
    tracing::debug!(worker, "Evaluation worker stopped");
}
