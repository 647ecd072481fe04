//! Re-running or reconstructing recorded runs

mod demo;
mod engine;
mod registry;

pub use demo::{DemoAgent, DEMO_AGENT_NAME, DEMO_PROMPT};
pub use engine::{ReplayEngine, ReplayError};
pub use registry::{ExecutorRegistry, ReplayExecutor};
