//! Binds one live viewer connection to one run channel.

use std::fmt::Display;
use std::time::Duration;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use super::envelope::ChannelMessage;
use super::hub::ChannelHub;

/// Outbound messages queued between the forwarding loop and the writer.
const OUTBOUND_BUFFER: usize = 256;

/// What the client side of the connection reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSignal {
    /// Any frame that does not end the connection
    Activity,
    Closed,
}

/// Why a bridge stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    ClientClosed,
    TransportError,
    SerializationFailed,
    Shutdown,
    /// The run channel was torn down underneath the subscriber
    ChannelClosed,
}

/// Relays a run channel to a client sink with periodic keepalives.
#[derive(Clone)]
pub struct EventBridge {
    hub: ChannelHub,
    keepalive: Duration,
    shutdown: CancellationToken,
}

impl EventBridge {
    pub fn new(hub: ChannelHub, keepalive: Duration, shutdown: CancellationToken) -> Self {
        Self {
            hub,
            keepalive,
            shutdown,
        }
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    /// Forward `run_id`'s channel into `sink` until the client leaves, the
    /// transport fails, or the server shuts down.
    ///
    /// Every exit path, including dropping this future, unsubscribes and
    /// stops the writer and keepalive tasks.
    pub async fn run<S, I>(&self, run_id: i64, sink: S, mut inbound: I) -> BridgeExit
    where
        S: Sink<String> + Send + Unpin + 'static,
        S::Error: Display,
        I: Stream<Item = ClientSignal> + Unpin,
    {
        let mut subscription = self.hub.subscribe(run_id);
        let connection = self.shutdown.child_token();
        let (out_tx, out_rx) = mpsc::channel::<ChannelMessage>(OUTBOUND_BUFFER);

        let mut writer = tokio::spawn(write_messages(sink, out_rx, run_id));
        let keepalive = tokio::spawn(send_keepalives(
            out_tx.clone(),
            self.keepalive,
            connection.clone(),
        ));
        let _guard = BridgeGuard {
            connection: connection.clone(),
            tasks: [writer.abort_handle(), keepalive.abort_handle()],
        };

        tracing::debug!(run_id, "Live viewer connected");

        // Holds one message while the writer is backed up, so shutdown and
        // client close are still observed.
        let mut pending: Option<ChannelMessage> = None;

        let exit = loop {
            tokio::select! {
                biased;

                finished = &mut writer => {
                    break finished.unwrap_or(BridgeExit::TransportError);
                }
                _ = connection.cancelled() => break BridgeExit::Shutdown,
                signal = inbound.next() => match signal {
                    Some(ClientSignal::Activity) => {}
                    Some(ClientSignal::Closed) | None => break BridgeExit::ClientClosed,
                },
                permit = out_tx.reserve(), if pending.is_some() => match permit {
                    Ok(permit) => {
                        if let Some(message) = pending.take() {
                            permit.send(message);
                        }
                    }
                    Err(_) => break BridgeExit::TransportError,
                },
                received = subscription.recv(), if pending.is_none() => match received {
                    Ok(message) => pending = Some(message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(run_id, skipped, "Live viewer fell behind; messages dropped");
                    }
                    Err(RecvError::Closed) => break BridgeExit::ChannelClosed,
                },
            }
        };

        tracing::debug!(run_id, exit = ?exit, "Live viewer disconnected");
        exit
    }
}

/// Cancels the connection token and aborts helper tasks when the bridge ends.
struct BridgeGuard {
    connection: CancellationToken,
    tasks: [AbortHandle; 2],
}

impl Drop for BridgeGuard {
    fn drop(&mut self) {
        self.connection.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn write_messages<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<ChannelMessage>,
    run_id: i64,
) -> BridgeExit
where
    S: Sink<String> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(run_id, error = %e, "Failed to serialize channel message");
                return BridgeExit::SerializationFailed;
            }
        };
        if let Err(e) = sink.send(json).await {
            tracing::debug!(run_id, error = %e, "Live viewer transport failed");
            return BridgeExit::TransportError;
        }
    }
    BridgeExit::ClientClosed
}

async fn send_keepalives(
    outbound: mpsc::Sender<ChannelMessage>,
    period: Duration,
    connection: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = connection.cancelled() => break,
            _ = ticker.tick() => {
                if outbound.send(ChannelMessage::Ping).await.is_err() {
                    break;
                }
            }
        }
    }
}
