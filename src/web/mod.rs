//! HTTP and WebSocket surface.

pub mod error;
pub mod handlers;
pub mod routes;
mod server;
pub mod state;
pub mod ws;

pub use error::WebError;
pub use server::{build_router, run_server, ServerConfig};
pub use state::WebAppState;
