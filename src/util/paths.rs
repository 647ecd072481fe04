//! Path utilities for OrchestrAI data directories

use std::path::PathBuf;
use std::sync::OnceLock;

/// Custom data directory chosen on the command line or via environment
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Call this from main() before any other path function.
/// Falls back to ~/.orchestrai when no path is given.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let path = custom_path.unwrap_or_else(default_data_dir);
    if DATA_DIR.set(path.clone()).is_err() {
        let existing = DATA_DIR
            .get()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        tracing::debug!(
            path = %path.display(),
            existing = %existing,
            "Data directory already initialized"
        );
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".orchestrai"))
        .unwrap_or_else(|| PathBuf::from(".orchestrai"))
}

/// Base data directory: the custom path if one was set, otherwise ~/.orchestrai
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Default database file (~/.orchestrai/orchestrai.db)
pub fn database_path() -> PathBuf {
    data_dir().join("orchestrai.db")
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Server log file (~/.orchestrai/logs/orchestrai.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("orchestrai.log")
}

/// Config file path (~/.orchestrai/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}
