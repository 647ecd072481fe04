//! WebSocket endpoint streaming a run's steps as they are recorded.

use axum::extract::ws::{Message, WebSocket};
use futures::{future, SinkExt, StreamExt};

use crate::events::{BridgeExit, ClientSignal, EventBridge};

/// Relay `run_id`'s channel to the socket until either side goes away.
///
/// Clients are not expected to send anything; any frame other than a close
/// only counts as activity.
pub async fn stream_run_steps(socket: WebSocket, run_id: i64, bridge: EventBridge) -> BridgeExit {
    let (ws_sender, ws_receiver) = socket.split();

    let sink = ws_sender.with(|json: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(json.into())))
    });
    let inbound = ws_receiver.map(move |frame| match frame {
        Ok(Message::Close(_)) => ClientSignal::Closed,
        Ok(_) => ClientSignal::Activity,
        Err(e) => {
            tracing::debug!(run_id, error = %e, "WebSocket receive error");
            ClientSignal::Closed
        }
    });

    bridge.run(run_id, sink, inbound).await
}
