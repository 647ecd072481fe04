//! Core module containing the run tracing services.
//!
//! - The trace store and its status state machine
//! - Provider-backed agent runs
//! - The shared service container used by the web layer

mod agent_run;
mod error;
mod orchestrai_core;
mod trace_store;

pub use agent_run::{run_with_provider, AgentRunError};
pub use error::TraceError;
pub use orchestrai_core::OrchestraiCore;
pub use trace_store::{TraceStore, MAX_AGENT_NAME_LEN, MAX_PAGE_SIZE};
