pub mod config;
pub mod core;
pub mod data;
pub mod eval;
pub mod events;
pub mod provider;
pub mod replay;
pub mod util;
pub mod web;

pub use config::Config;
pub use crate::core::{run_with_provider, AgentRunError, OrchestraiCore, TraceError, TraceStore};
pub use data::{
    Database, DatabaseError, Eval, NewStep, Run, RunDetail, RunOrigin, RunStatus, RunUpdate, Step,
    StepType,
};
pub use eval::{EvalDispatcher, EvalOutcome, OfflineBasicScorer, Scorer};
pub use events::{channel_name, BridgeExit, ChannelHub, ChannelMessage, EventBridge, EventPublisher};
pub use provider::{ModelProvider, ProviderConfig, ProviderError, ProviderReply};
pub use replay::{DemoAgent, ExecutorRegistry, ReplayEngine, ReplayError, ReplayExecutor};
