//! Live propagation of recorded steps to connected viewers.
//!
//! Delivery is at-most-once and FIFO per run channel. Nothing is persisted:
//! a viewer only sees steps published while it is subscribed.

mod bridge;
mod envelope;
mod hub;

pub use bridge::{BridgeExit, ClientSignal, EventBridge};
pub use envelope::{channel_name, ChannelMessage};
pub use hub::{ChannelHub, EventPublisher, Subscription};
