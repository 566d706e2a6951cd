//! fepa-admin - command-line front end for the FEPA admin API

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use config::AdminSettings;
use fepa_http::ClientError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, error, info};

#[derive(Parser)]
#[command(name = "fepa-admin")]
#[command(about = "Administer a FEPA deployment from the terminal")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Data directory for stored credentials and logs
    #[arg(short = 'd', long, global = true, env = "FEPA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file (TOML, YAML, or JSON)
    #[arg(short = 'c', long, global = true, env = "FEPA_CONFIG")]
    config: Option<PathBuf>,

    /// Timeout for one-shot commands in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "60")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = AdminSettings::load(cli.config.as_deref())?;
    let data_dir = settings.resolve_data_dir(cli.data_dir);
    logging::init_logging(cli.log_level.into(), &data_dir, cli.no_file_log, cli.log_json)?;

    info!(base_url = %settings.api.base_url, "Starting fepa-admin");

    let bounded = cli.timeout > 0 && !cli.command.is_long_running();
    let run = cli.command.execute(settings, &data_dir);

    let result = if bounded {
        match tokio::time::timeout(Duration::from_secs(cli.timeout), run).await {
            Ok(result) => result,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    } else {
        run.await
    };

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            if e
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_session_expired)
            {
                eprintln!("Session expired; run `fepa-admin login` to sign in again");
            }
            error!("Command failed: {e:#}");
            std::process::exit(1);
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
