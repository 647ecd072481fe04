use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use orchestrai::web::{run_server, ServerConfig, WebAppState};
use orchestrai::{util, Config, Database, OrchestraiCore};

/// Agent run trace store with live step streaming and replay
#[derive(Debug, Parser)]
#[command(name = "orchestrai", version, about)]
struct Cli {
    /// Data directory (defaults to ~/.orchestrai)
    #[arg(long, global = true, env = "ORCHESTRAI_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP and WebSocket server (default)
    Serve {
        #[arg(long, env = "ORCHESTRAI_HOST")]
        host: Option<String>,
        #[arg(long, env = "ORCHESTRAI_PORT")]
        port: Option<u16>,
    },
    /// Apply database migrations and print the schema version
    Migrate,
}

fn init_logging(log_stderr: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if log_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    // Log to file (~/.orchestrai/logs/orchestrai.log)
    fs::create_dir_all(util::logs_dir())?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir);
    init_logging(cli.log_stderr)?;

    let mut config = Config::load();

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config = config.with_host(host);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }

            let server_config = ServerConfig::from(&config);
            let core = OrchestraiCore::open(config)?;
            run_server(WebAppState::new(core), server_config).await
        }
        Command::Migrate => {
            let path = config.resolved_database_path();
            let db = Database::open(path.clone())?;
            let version = db.schema_version()?;
            println!("{}: schema version {}", path.display(), version);
            Ok(())
        }
    }
}
