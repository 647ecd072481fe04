//! Integration tests for background evaluation
//!
//! Tests the flow: finished run -> EvalDispatcher -> eval history and snapshot

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use orchestrai::eval::{EvalOutcome, JobState};
use orchestrai::replay::DemoAgent;
use orchestrai::{OrchestraiCore, RunStatus, RunUpdate};

use super::common::fixtures::{core_on_disk, fixed_clock};

async fn wait_for_outcome(core: &OrchestraiCore, job_id: Uuid) -> EvalOutcome {
    for _ in 0..500 {
        match core.evals().job(job_id) {
            Some(JobState::Completed { outcome }) => return outcome,
            Some(JobState::Queued { .. }) => tokio::time::sleep(Duration::from_millis(10)).await,
            None => panic!("job {job_id} is not tracked"),
        }
    }
    panic!("job {job_id} never completed");
}

/// A queued evaluation scores the run and mirrors the newest result onto it
#[tokio::test]
async fn test_evaluation_updates_history_and_snapshot() {
    let (_dir, core) = core_on_disk();
    let run = DemoAgent::with_fixed_clock(fixed_clock())
        .run(core.store())
        .unwrap();

    let first = core.evals().enqueue(run.id).await.unwrap();
    let outcome = wait_for_outcome(&core, first).await;
    assert!(outcome.ok);
    assert_eq!(outcome.run_id, run.id);
    assert_eq!(outcome.provider.as_deref(), Some("offline_basic"));

    let scores = outcome.scores.expect("Completed eval carries scores");
    assert_eq!(scores["non_empty_output"], json!(true));
    assert_eq!(scores["output_length"], json!(27));

    let second = core.evals().enqueue(run.id).await.unwrap();
    assert!(wait_for_outcome(&core, second).await.ok);

    let history = core.store().list_evals(run.id).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].id < history[1].id);

    let scored = core.store().find_run(run.id).unwrap();
    assert_eq!(scored.eval_provider.as_deref(), Some("offline_basic"));
    assert_eq!(scored.eval_status.as_deref(), Some("success"));
    assert_eq!(scored.eval_scores.as_ref(), Some(&history[1].scores));
    // Evaluation never changes the run's own outcome
    assert_eq!(scored.status, RunStatus::Success);
}

/// A run deleted before its job is picked up completes as a failure
#[tokio::test]
async fn test_evaluation_of_deleted_run_fails() {
    let (_dir, core) = core_on_disk();
    let run = core.store().create_run("ephemeral", "p").unwrap();
    core.store().delete_run(run.id).unwrap();

    let job = core.evals().enqueue(run.id).await.unwrap();
    let outcome = wait_for_outcome(&core, job).await;

    assert!(!outcome.ok);
    assert_eq!(outcome.error.as_deref(), Some("run not found"));
    assert!(outcome.eval_id.is_none());
}

/// Failed runs are still scored, against their missing output
#[tokio::test]
async fn test_failed_run_scores_empty_output() {
    let (_dir, core) = core_on_disk();
    let run = core
        .store()
        .create_run("flaky", "Summarize the quarterly report")
        .unwrap();
    core.store()
        .update_run(
            run.id,
            RunUpdate::status(RunStatus::Failed).with_error_message("upstream returned 503"),
        )
        .unwrap();

    let job = core.evals().enqueue(run.id).await.unwrap();
    let outcome = wait_for_outcome(&core, job).await;

    assert!(outcome.ok);
    let scores = outcome.scores.unwrap();
    assert_eq!(scores["non_empty_output"], json!(false));
    assert_eq!(scores["keyword_overlap"], json!(0));
}
