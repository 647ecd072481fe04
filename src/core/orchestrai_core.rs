//! Service container shared by the server and CLI.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use super::trace_store::TraceStore;
use crate::config::Config;
use crate::data::{Database, DatabaseError};
use crate::eval::{EvalDispatcher, OfflineBasicScorer, Scorer};
use crate::events::{ChannelHub, EventBridge};
use crate::replay::{ExecutorRegistry, ReplayEngine};

/// Owns the database, the live channel hub, and every service built on them.
pub struct OrchestraiCore {
    config: Config,
    database: Database,
    hub: ChannelHub,
    store: TraceStore,
    replay: ReplayEngine,
    evals: EvalDispatcher,
    shutdown: CancellationToken,
}

impl OrchestraiCore {
    /// Open the configured database and start the evaluation workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(config: Config) -> Result<Self, DatabaseError> {
        let database = Database::open(config.resolved_database_path())?;
        Ok(Self::with_database(config, database))
    }

    /// Build every service on top of an already opened database.
    pub fn with_database(config: Config, database: Database) -> Self {
        let registry = ExecutorRegistry::with_defaults(Utc::now());
        Self::build(config, database, registry, Arc::new(OfflineBasicScorer))
    }

    pub fn build(
        config: Config,
        database: Database,
        registry: ExecutorRegistry,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        let hub = ChannelHub::new(config.channel_capacity);
        let store = TraceStore::new(database.clone(), Arc::new(hub.clone()));
        let replay = ReplayEngine::new(store.clone(), Arc::new(registry));
        let evals = EvalDispatcher::spawn(
            store.clone(),
            scorer,
            config.eval_workers,
            config.eval_queue_capacity,
        );

        tracing::info!(
            database = %database.path.display(),
            executors = ?replay.registry().agent_names(),
            eval_workers = config.eval_workers,
            "Core services ready"
        );

        Self {
            config,
            database,
            hub,
            store,
            replay,
            evals,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    pub fn replay_engine(&self) -> &ReplayEngine {
        &self.replay
    }

    pub fn evals(&self) -> &EvalDispatcher {
        &self.evals
    }

    /// Cancelled when the server begins shutting down
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// A bridge for one live viewer, tied to server shutdown
    pub fn event_bridge(&self) -> EventBridge {
        EventBridge::new(
            self.hub.clone(),
            self.config.keepalive_interval,
            self.shutdown.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RunStatus;
    use crate::replay::DemoAgent;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.database_path = Some(dir.path().join("runs.db"));

        let core = OrchestraiCore::open(config).unwrap();
        assert!(dir.path().join("runs.db").exists());
        assert!(core.database().schema_version().unwrap() >= 4);
    }

    #[tokio::test]
    async fn test_demo_run_replays_through_registry() {
        let core = OrchestraiCore::with_database(
            Config::default(),
            Database::open_in_memory().unwrap(),
        );
        let run = DemoAgent::live().run(core.store()).unwrap();
        let replayed = core.replay_engine().replay(run.id).await.unwrap();
        assert_eq!(replayed.status, RunStatus::Replayed);
        assert_eq!(core.store().get_run(replayed.id).unwrap().steps.len(), 3);
    }
}
