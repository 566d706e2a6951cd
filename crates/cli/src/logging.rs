use anyhow::Result;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_NAME: &str = "fepa-admin.log";

/// Initialize logging for the CLI
///
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(
    log_level: Level,
    data_dir: &Path,
    no_file_log: bool,
    json: bool,
) -> Result<()> {
    if no_file_log {
        init_stderr_logging(log_level, json);
        Ok(())
    } else {
        init_file_logging(log_level, data_dir, json)
    }
}

fn env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("fepa_admin={level_str},fepa_http={level_str},fepa_core={level_str}").into()
    })
}

fn init_file_logging(level: Level, data_dir: &Path, json: bool) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join(LOG_FILE_NAME))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(file_layer.json())
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn init_stderr_logging(level: Level, json: bool) {
    if json {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter(level))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
