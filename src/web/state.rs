//! Shared state for axum handlers.

use std::sync::Arc;

use crate::core::OrchestraiCore;

/// Cheaply cloneable handle to the core services.
#[derive(Clone)]
pub struct WebAppState {
    core: Arc<OrchestraiCore>,
}

impl WebAppState {
    pub fn new(core: OrchestraiCore) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    pub fn core(&self) -> &OrchestraiCore {
        &self.core
    }
}
