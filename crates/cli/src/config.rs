//! CLI configuration

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix; nested keys use `__`, e.g. `FEPA_API__BASE_URL`
pub const ENV_PREFIX: &str = "FEPA";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminSettings {
    pub api: ApiSettings,
    pub notifications: NotificationSettings,
    /// Where credentials and logs are kept; platform data dir when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    /// Push socket endpoint; push is disabled when unset
    #[serde(default)]
    pub socket_url: Option<String>,
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationSettings {
    pub poll_interval_secs: u64,
}

impl AdminSettings {
    /// Load settings from defaults, an optional file, and the process environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_from(file, None)
    }

    /// Like [`Self::load`], reading environment overrides from `env` when given
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("api.base_url", "http://localhost:5000/api")?
            .set_default("api.timeout_secs", 30)?
            .set_default("notifications.poll_interval_secs", 30)?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.notifications.poll_interval_secs.max(1))
    }

    /// Resolve the data directory: CLI flag, then settings, then platform default
    pub fn resolve_data_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.data_dir.clone())
            .unwrap_or_else(default_data_dir)
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("app", "FEPA", "fepa-admin").map_or_else(
        || PathBuf::from(".fepa-admin"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
