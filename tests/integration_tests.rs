//! Main entry point for integration tests
//!
//! Run with: `cargo test --test integration_tests`
//!
//! The `common` module is loaded via `#[path]` from the integration module
//! so it is compiled once.

mod integration;

pub use integration::*;
