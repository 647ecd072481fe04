//! Integration tests for live step streaming
//!
//! Tests the flow: TraceStore append -> ChannelHub -> EventBridge -> viewer sink

use std::time::Duration;

use futures::channel::mpsc as client;
use futures::StreamExt;
use serde_json::{json, Value};

use orchestrai::events::ClientSignal;
use orchestrai::{BridgeExit, ChannelHub, ChannelMessage, NewStep, StepType};

use super::common::fixtures::core_in_memory;

const KEEPALIVE: Duration = Duration::from_secs(25);

async fn wait_for_subscribers(hub: &ChannelHub, run_id: i64, expected: usize) {
    for _ in 0..1_000 {
        if hub.subscriber_count(run_id) == expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("run {run_id} never reached {expected} subscribers");
}

async fn next_frame(delivered: &mut client::UnboundedReceiver<String>) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(5), delivered.next())
        .await
        .expect("Timed out waiting for a frame")
        .expect("Viewer stream ended");
    serde_json::from_str(&text).expect("Frame should be JSON")
}

/// Every connected viewer receives appended steps in append order
#[tokio::test]
async fn test_viewers_receive_appended_steps_in_order() {
    let core = core_in_memory(KEEPALIVE);
    let run = core.store().create_run("streamer", "Say hello").unwrap();

    let mut viewers = Vec::new();
    for _ in 0..2 {
        let bridge = core.event_bridge();
        let (sink, delivered) = client::unbounded::<String>();
        let (signals, inbound) = client::unbounded::<ClientSignal>();
        let run_id = run.id;
        let task = tokio::spawn(async move { bridge.run(run_id, sink, inbound).await });
        viewers.push((task, delivered, signals));
    }
    wait_for_subscribers(core.hub(), run.id, 2).await;

    for name in ["plan", "act", "answer"] {
        core.store()
            .append_step(
                run.id,
                NewStep::new(StepType::AgentLog)
                    .with_name(name)
                    .with_output(json!({"message": name})),
            )
            .unwrap();
    }

    for (task, mut delivered, signals) in viewers {
        let mut names = Vec::new();
        for _ in 0..3 {
            let frame = next_frame(&mut delivered).await;
            assert_eq!(frame["event"], "step");
            assert_eq!(frame["run_id"], run.id);
            names.push(frame["step"]["name"].as_str().unwrap().to_string());
        }
        assert_eq!(names, vec!["plan", "act", "answer"]);

        signals.unbounded_send(ClientSignal::Closed).unwrap();
        assert_eq!(task.await.unwrap(), BridgeExit::ClientClosed);
    }

    assert_eq!(core.hub().channel_count(), 0);
}

/// Steps of one run never leak into another run's channel
#[tokio::test]
async fn test_channels_are_isolated_per_run() {
    let core = core_in_memory(KEEPALIVE);
    let watched = core.store().create_run("watched", "p").unwrap();
    let other = core.store().create_run("other", "p").unwrap();

    let mut subscription = core.hub().subscribe(watched.id);
    assert_eq!(subscription.channel(), format!("run:{}", watched.id));

    core.store()
        .append_step(other.id, NewStep::new(StepType::AgentLog).with_name("noise"))
        .unwrap();
    let step = core
        .store()
        .append_step(watched.id, NewStep::new(StepType::AgentLog).with_name("signal"))
        .unwrap();

    match subscription.recv().await.unwrap() {
        ChannelMessage::Step { run_id, step: received } => {
            assert_eq!(run_id, watched.id);
            assert_eq!(received, step);
        }
        message => panic!("Expected a step message, got {:?}", message),
    }
}

/// A rejected append publishes nothing
#[tokio::test]
async fn test_failed_append_is_not_published() {
    let core = core_in_memory(KEEPALIVE);
    let run = core.store().create_run("strict", "p").unwrap();
    let mut subscription = core.hub().subscribe(run.id);

    let rejected = core.store().append_step(
        run.id,
        NewStep::new(StepType::ToolCall).with_input(json!(["not", "an", "object"])),
    );
    assert!(rejected.is_err());

    let accepted = core
        .store()
        .append_step(run.id, NewStep::new(StepType::ToolCall).with_name("ok"))
        .unwrap();
    assert_eq!(
        subscription.recv().await.unwrap(),
        ChannelMessage::step(accepted)
    );
}

/// Server shutdown disconnects every live viewer
#[tokio::test]
async fn test_shutdown_disconnects_viewers() {
    let core = core_in_memory(KEEPALIVE);
    let run = core.store().create_run("long", "p").unwrap();

    let bridge = core.event_bridge();
    let (sink, _delivered) = client::unbounded::<String>();
    let (_signals, inbound) = client::unbounded::<ClientSignal>();
    let run_id = run.id;
    let task = tokio::spawn(async move { bridge.run(run_id, sink, inbound).await });
    wait_for_subscribers(core.hub(), run.id, 1).await;

    core.shutdown_token().cancel();
    assert_eq!(task.await.unwrap(), BridgeExit::Shutdown);
    assert_eq!(core.hub().channel_count(), 0);
}
