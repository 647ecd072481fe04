//! Per-run broadcast channels

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast::{self, error::RecvError};

use super::envelope::{channel_name, ChannelMessage};
use crate::data::Step;

/// Sink for freshly recorded steps. Publishing never fails the caller.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, step: &Step);
}

type Channels = Arc<RwLock<HashMap<String, broadcast::Sender<ChannelMessage>>>>;

/// In-process registry of run channels.
///
/// A channel exists only while it has at least one subscriber, so publishing
/// to a run nobody watches allocates nothing.
#[derive(Clone)]
pub struct ChannelHub {
    channels: Channels,
    capacity: usize,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to a run's channel, creating it if needed.
    pub fn subscribe(&self, run_id: i64) -> Subscription {
        let name = channel_name(run_id);
        let receiver = {
            let mut channels = self.channels.write();
            channels
                .entry(name.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        tracing::debug!(channel = %name, "Subscribed to run channel");

        Subscription {
            channel: name,
            receiver: Some(receiver),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Send a message to whoever is currently subscribed to the run.
    pub fn send(&self, run_id: i64, message: ChannelMessage) {
        let name = channel_name(run_id);
        let sender = self.channels.read().get(&name).cloned();
        let Some(sender) = sender else {
            tracing::debug!(channel = %name, "No live subscribers; dropping message");
            return;
        };

        match sender.send(message) {
            Ok(receivers) => {
                tracing::debug!(channel = %name, receivers, "Published message");
            }
            Err(_) => {
                tracing::debug!(channel = %name, "Subscribers went away before publish");
            }
        }
    }

    /// Live subscribers on a run's channel
    pub fn subscriber_count(&self, run_id: i64) -> usize {
        self.channels
            .read()
            .get(&channel_name(run_id))
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Channels currently held open by subscribers
    pub fn channel_count(&self) -> usize {
        self.channels.read().len()
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventPublisher for ChannelHub {
    fn publish(&self, step: &Step) {
        self.send(step.run_id, ChannelMessage::step(step.clone()));
    }
}

impl std::fmt::Debug for ChannelHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHub")
            .field("channels", &self.channel_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A live subscription to one run channel.
///
/// Dropping it unsubscribes and removes the channel once nobody else listens.
pub struct Subscription {
    channel: String,
    receiver: Option<broadcast::Receiver<ChannelMessage>>,
    channels: Channels,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next message in publish order
    pub async fn recv(&mut self) -> Result<ChannelMessage, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        drop(self.receiver.take());

        let mut channels = self.channels.write();
        let unused = channels
            .get(&self.channel)
            .map(|sender| sender.receiver_count() == 0)
            .unwrap_or(false);
        if unused {
            channels.remove(&self.channel);
            tracing::debug!(channel = %self.channel, "Released run channel");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StepType;
    use chrono::Utc;

    fn step(run_id: i64, id: i64) -> Step {
        Step {
            id,
            run_id,
            step_type: StepType::AgentLog,
            name: None,
            input: None,
            output: None,
            latency_ms: None,
            cost_usd: None,
            tokens: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = ChannelHub::default();
        hub.publish(&step(1, 1));
        assert_eq!(hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_publish_order() {
        let hub = ChannelHub::default();
        let mut sub = hub.subscribe(7);
        assert_eq!(sub.channel(), "run:7");

        hub.publish(&step(7, 1));
        hub.publish(&step(7, 2));
        hub.publish(&step(8, 3));

        for expected in [1, 2] {
            match sub.recv().await.unwrap() {
                ChannelMessage::Step { run_id, step } => {
                    assert_eq!(run_id, 7);
                    assert_eq!(step.id, expected);
                }
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[test]
    fn test_last_drop_releases_channel() {
        let hub = ChannelHub::default();
        let first = hub.subscribe(3);
        let second = hub.subscribe(3);
        assert_eq!(hub.subscriber_count(3), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(3), 1);
        assert_eq!(hub.channel_count(), 1);

        drop(second);
        assert_eq!(hub.subscriber_count(3), 0);
        assert_eq!(hub.channel_count(), 0);
    }
}
