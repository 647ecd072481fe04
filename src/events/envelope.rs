//! Wire messages sent to live viewers

use serde::{Deserialize, Serialize};

use crate::data::Step;

/// Name of the broadcast channel carrying a run's steps
pub fn channel_name(run_id: i64) -> String {
    format!("run:{run_id}")
}

/// Message delivered on a run channel.
///
/// Serializes as `{"event":"step","run_id":..,"step":{..}}` or `{"event":"ping"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChannelMessage {
    Step { run_id: i64, step: Step },
    Ping,
}

impl ChannelMessage {
    pub fn step(step: Step) -> Self {
        ChannelMessage::Step {
            run_id: step.run_id,
            step,
        }
    }
}
