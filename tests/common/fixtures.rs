//! Core and database fixtures

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use orchestrai::config::Config;
use orchestrai::{Database, ExecutorRegistry, OfflineBasicScorer, OrchestraiCore};
use tempfile::TempDir;

/// Clock used by the demo executor in every fixture
pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// A core backed by a database file inside a temp dir.
///
/// Keep the returned `TempDir` alive for as long as the core is used.
pub fn core_on_disk() -> (TempDir, Arc<OrchestraiCore>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database =
        Database::open(dir.path().join("orchestrai.db")).expect("Failed to open database");
    (dir, build_core(database, Duration::from_secs(25)))
}

/// A core on an in-memory database with a custom keepalive interval
pub fn core_in_memory(keepalive: Duration) -> Arc<OrchestraiCore> {
    let database = Database::open_in_memory().expect("Failed to open database");
    build_core(database, keepalive)
}

fn build_core(database: Database, keepalive: Duration) -> Arc<OrchestraiCore> {
    let config = Config::default().with_keepalive_interval(keepalive);
    Arc::new(OrchestraiCore::build(
        config,
        database,
        ExecutorRegistry::with_defaults(fixed_clock()),
        Arc::new(OfflineBasicScorer),
    ))
}
