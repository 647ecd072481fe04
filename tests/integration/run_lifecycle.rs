//! Integration tests for the run lifecycle
//!
//! Tests the flow: create run -> append steps -> finish -> replay -> delete,
//! against a database file on disk.

use serde_json::json;

use orchestrai::data::RunStatus;
use orchestrai::replay::{DemoAgent, ReplayError, DEMO_AGENT_NAME, DEMO_PROMPT};
use orchestrai::{Database, NewStep, RunOrigin, RunUpdate, StepType, TraceError};

use super::common::fixtures::{core_on_disk, fixed_clock};

/// Record a small arithmetic run that finishes successfully
#[tokio::test]
async fn test_recorded_run_reads_back_in_order() {
    let (_dir, core) = core_on_disk();
    let store = core.store();

    let run = store
        .create_run("calculator", "What is 2+2?")
        .expect("Failed to create run");
    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.origin, RunOrigin::Original);

    store
        .append_step(
            run.id,
            NewStep::new(StepType::LlmCall)
                .with_name("model")
                .with_input(json!({"prompt": "What is 2+2?"}))
                .with_output(json!({"text": "4"}))
                .with_latency_ms(120.0)
                .with_cost(0.0004, 18),
        )
        .expect("Failed to append llm step");
    store
        .update_run(
            run.id,
            RunUpdate::status(RunStatus::Success)
                .with_final_output("4")
                .with_totals(18, 0.0004),
        )
        .expect("Failed to finish run");

    let detail = store.get_run(run.id).expect("Run should exist");
    assert_eq!(detail.run.status, RunStatus::Success);
    assert_eq!(detail.run.final_output.as_deref(), Some("4"));
    assert_eq!(detail.run.total_tokens, 18);

    let types: Vec<StepType> = detail.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(types, vec![StepType::UserInput, StepType::LlmCall]);
    assert_eq!(
        detail.steps[0].input,
        Some(json!({"prompt": "What is 2+2?"}))
    );
    assert!(detail.steps[0].created_at <= detail.steps[1].created_at);
}

/// Finished runs survive reopening the database file
#[tokio::test]
async fn test_run_persists_across_reopen() {
    let (dir, core) = core_on_disk();
    let run = DemoAgent::with_fixed_clock(fixed_clock())
        .run(core.store())
        .expect("Demo run should succeed");
    drop(core);

    let reopened = Database::open(dir.path().join("orchestrai.db")).expect("Failed to reopen");
    let store = orchestrai::TraceStore::new(
        reopened,
        std::sync::Arc::new(orchestrai::ChannelHub::default()),
    );
    let detail = store.get_run(run.id).expect("Run should persist");

    assert_eq!(detail.run.agent_name, DEMO_AGENT_NAME);
    assert_eq!(detail.run.input_prompt, DEMO_PROMPT);
    assert_eq!(detail.run.status, RunStatus::Success);
    assert_eq!(detail.steps.len(), 3);
}

/// A run with no registered executor is replayed by cloning its trace
#[tokio::test]
async fn test_replay_clones_unregistered_agent() {
    let (_dir, core) = core_on_disk();
    let store = core.store();

    let source = store.create_run("calculator", "What is 2+2?").unwrap();
    store
        .append_step(
            source.id,
            NewStep::new(StepType::ToolCall)
                .with_name("add")
                .with_input(json!({"a": 2, "b": 2}))
                .with_output(json!({"sum": 4})),
        )
        .unwrap();
    store
        .update_run(
            source.id,
            RunUpdate::status(RunStatus::Success)
                .with_final_output("4")
                .with_totals(7, 0.01),
        )
        .unwrap();

    let replayed = core
        .replay_engine()
        .replay(source.id)
        .await
        .expect("Replay should succeed");

    assert_ne!(replayed.id, source.id);
    assert_eq!(replayed.status, RunStatus::Replayed);
    assert_eq!(replayed.origin, RunOrigin::Replay);
    assert_eq!(replayed.final_output.as_deref(), Some("4"));
    assert_eq!(replayed.total_tokens, 7);

    let original = store.get_run(source.id).unwrap();
    let copy = store.get_run(replayed.id).unwrap();
    assert_eq!(original.steps.len(), copy.steps.len());
    for (a, b) in original.steps.iter().zip(&copy.steps) {
        assert_eq!(a.step_type, b.step_type);
        assert_eq!(a.name, b.name);
        assert_eq!(a.input, b.input);
        assert_eq!(a.output, b.output);
        assert_ne!(a.id, b.id);
    }

    // The source is left untouched
    assert_eq!(original.run.status, RunStatus::Success);
}

/// The demo agent replays deterministically through its executor
#[tokio::test]
async fn test_demo_replay_is_deterministic() {
    let (_dir, core) = core_on_disk();
    let source = DemoAgent::live().run(core.store()).unwrap();

    let first = core.replay_engine().replay(source.id).await.unwrap();
    let second = core.replay_engine().replay(source.id).await.unwrap();

    let expected = fixed_clock().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    assert_eq!(first.final_output.as_deref(), Some(expected.as_str()));
    assert_eq!(first.final_output, second.final_output);

    let names = |id| -> Vec<Option<String>> {
        core.store()
            .get_run(id)
            .unwrap()
            .steps
            .into_iter()
            .map(|s| s.name)
            .collect()
    };
    assert_eq!(names(first.id), names(second.id));
    assert_eq!(
        names(first.id),
        vec![
            Some("user_input".to_string()),
            Some("fake_llm".to_string()),
            Some("clock".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_replay_missing_source() {
    let (_dir, core) = core_on_disk();
    let result = core.replay_engine().replay(4242).await;
    assert!(matches!(result, Err(ReplayError::SourceNotFound(4242))));
}

/// Deleting a run removes its trace but leaves replays of it alone
#[tokio::test]
async fn test_delete_cascades_to_steps() {
    let (_dir, core) = core_on_disk();
    let store = core.store();
    let source = DemoAgent::live().run(store).unwrap();
    let replayed = core.replay_engine().replay(source.id).await.unwrap();

    store.delete_run(source.id).expect("Delete should succeed");

    assert!(matches!(
        store.get_run(source.id),
        Err(TraceError::RunNotFound(_))
    ));
    assert_eq!(store.step_store().count_for_run(source.id).unwrap(), 0);
    assert!(matches!(
        store.delete_run(source.id),
        Err(TraceError::RunNotFound(_))
    ));

    let survivor = store.get_run(replayed.id).expect("Replay should survive");
    assert_eq!(survivor.steps.len(), 3);
}

/// Terminal runs reject moving to another status
#[tokio::test]
async fn test_terminal_run_rejects_transition() {
    let (_dir, core) = core_on_disk();
    let store = core.store();
    let run = store.create_run("calculator", "What is 2+2?").unwrap();
    store
        .update_run(
            run.id,
            RunUpdate::status(RunStatus::Failed).with_error_message("model timed out"),
        )
        .unwrap();

    let err = store
        .update_run(
            run.id,
            RunUpdate::status(RunStatus::Success).with_final_output("4"),
        )
        .unwrap_err();
    assert!(matches!(err, TraceError::InvalidTransition { .. }));
    assert!(err.is_client_error());
}

/// Provider supplied by an embedding application
struct EchoProvider;

#[async_trait::async_trait]
impl orchestrai::ModelProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(
        &self,
        prompt: &str,
        _config: &orchestrai::ProviderConfig,
    ) -> Result<orchestrai::ProviderReply, orchestrai::ProviderError> {
        Ok(orchestrai::ProviderReply {
            text: prompt.to_uppercase(),
            usage: Some(json!({"input_tokens": 3, "output_tokens": 2})),
            raw: json!({"echo": prompt}),
        })
    }
}

/// An external provider drives a traced run through the public API
#[tokio::test]
async fn test_external_provider_run_is_traced() {
    let (_dir, core) = core_on_disk();
    let config = orchestrai::ProviderConfig::default().with_model("echo-1");

    let run = orchestrai::run_with_provider(core.store(), &EchoProvider, "echoer", "hello", &config)
        .await
        .expect("Provider run should succeed");

    assert_eq!(run.status, RunStatus::Success);
    assert_eq!(run.final_output.as_deref(), Some("HELLO"));
    assert_eq!(run.total_tokens, 5);

    let steps = core.store().get_run(run.id).unwrap().steps;
    let names: Vec<_> = steps.iter().filter_map(|s| s.name.as_deref()).collect();
    assert_eq!(names, vec!["user_input", "echo_call"]);
    assert_eq!(steps[1].output.as_ref().unwrap()["text"], "HELLO");
}
