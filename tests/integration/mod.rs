//! Integration tests for OrchestrAI
//!
//! These exercise the trace store, replay, evaluation and live streaming
//! together through the shared core.

#[path = "../common/mod.rs"]
pub mod common;

pub mod eval_flow;
pub mod live_stream;
pub mod run_lifecycle;
