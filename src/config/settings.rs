use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub host: String,
    pub port: u16,
    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
    /// Database file override (None = data directory default)
    pub database_path: Option<PathBuf>,
    /// Interval between keepalive pings on live streams
    pub keepalive_interval: Duration,
    /// Buffered messages per run channel
    pub channel_capacity: usize,
    /// Number of evaluation workers
    pub eval_workers: usize,
    /// Pending evaluation jobs accepted before enqueue applies backpressure
    pub eval_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_permissive: true,
            database_path: None,
            keepalive_interval: Duration::from_secs(25),
            channel_capacity: 256,
            eval_workers: 2,
            eval_queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_permissive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlDatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlStreamConfig {
    pub keepalive_secs: Option<u64>,
    pub channel_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlEvalConfig {
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub server: Option<TomlServerConfig>,
    pub database: Option<TomlDatabaseConfig>,
    pub stream: Option<TomlStreamConfig>,
    pub eval: Option<TomlEvalConfig>,
}

impl Config {
    /// Load configuration from the data directory, merging with defaults
    pub fn load() -> Self {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific file. Missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = Config::default();

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No config file loaded");
                return config;
            }
        };

        match toml::from_str::<TomlConfig>(&contents) {
            Ok(toml_config) => config.merge(toml_config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
            }
        }

        config
    }

    /// Overlay every value present in the TOML file
    pub fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(server) = toml_config.server {
            if let Some(host) = server.host {
                self.host = host;
            }
            if let Some(port) = server.port {
                self.port = port;
            }
            if let Some(cors) = server.cors_permissive {
                self.cors_permissive = cors;
            }
        }

        if let Some(database) = toml_config.database {
            if database.path.is_some() {
                self.database_path = database.path;
            }
        }

        if let Some(stream) = toml_config.stream {
            if let Some(secs) = stream.keepalive_secs {
                // A zero period would make the keepalive ticker spin.
                self.keepalive_interval = Duration::from_secs(secs.max(1));
            }
            if let Some(capacity) = stream.channel_capacity {
                self.channel_capacity = capacity.max(1);
            }
        }

        if let Some(eval) = toml_config.eval {
            if let Some(workers) = eval.workers {
                self.eval_workers = workers.max(1);
            }
            if let Some(capacity) = eval.queue_capacity {
                self.eval_queue_capacity = capacity.max(1);
            }
        }
    }

    /// Database file to open: the configured override or the data directory default
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::util::database_path)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &PathBuf) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }
}
