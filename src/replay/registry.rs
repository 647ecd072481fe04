use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::demo::{DemoAgent, DEMO_AGENT_NAME};
use crate::core::{TraceError, TraceStore};
use crate::data::Run;

/// Deterministically re-executes an agent against a freshly created run.
///
/// The executor records its own steps on `run` and settles its status. It
/// must not touch anything outside the trace store.
#[async_trait]
pub trait ReplayExecutor: Send + Sync {
    async fn execute(&self, store: &TraceStore, run: &Run) -> Result<(), TraceError>;
}

/// Agent name to executor table, built once at startup.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn ReplayExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in executors. `clock` pins the demo agent's time.
    pub fn with_defaults(clock: DateTime<Utc>) -> Self {
        Self::new().register(DEMO_AGENT_NAME, DemoAgent::with_fixed_clock(clock))
    }

    pub fn register(mut self, agent_name: impl Into<String>, executor: impl ReplayExecutor + 'static) -> Self {
        self.executors.insert(agent_name.into(), Arc::new(executor));
        self
    }

    pub fn get(&self, agent_name: &str) -> Option<Arc<dyn ReplayExecutor>> {
        self.executors.get(agent_name).cloned()
    }

    pub fn contains(&self, agent_name: &str) -> bool {
        self.executors.contains_key(agent_name)
    }

    /// Registered agent names, sorted
    pub fn agent_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.executors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("agents", &self.agent_names())
            .finish()
    }
}
