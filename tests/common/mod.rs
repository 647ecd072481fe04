//! Shared test utilities for OrchestrAI
//!
//! - Temporary on-disk databases
//! - Core builders with a pinned demo clock

pub mod fixtures;
