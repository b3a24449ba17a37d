//! Daemon configuration.
//!
//! Layered via figment: built-in defaults, then the TOML config file, then
//! `SNAPWEB_*` environment variables, then CLI flags. CLI flags win.

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_CONFIG_FILE: &str = "/etc/snapweb/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the snapraid executable
    pub snapraid_binary: String,
    /// Default snapraid config used when a request does not name one
    pub config_path: String,
    /// Directory holding schedules.json
    pub data_dir: PathBuf,
    /// Directory for per-invocation snapraid log files; unset disables `-l`
    pub log_dir: Option<PathBuf>,
    pub http_port: u16,
    /// Completed invocations kept in the in-memory history ring
    pub history_limit: usize,
    pub verbose: bool,
    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapraid_binary: "snapraid".to_string(),
            config_path: "/etc/snapraid.conf".to_string(),
            data_dir: PathBuf::from("/var/lib/snapweb"),
            log_dir: None,
            http_port: 8077,
            history_limit: 50,
            verbose: false,
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn new<T: Serialize>(cli_overrides: Option<&T>) -> Result<Self> {
        let config_file =
            std::env::var("SNAPWEB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("SNAPWEB_"));

        if let Some(overrides) = cli_overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        figment.extract().context("Failed to load configuration")
    }

    pub fn schedules_path(&self) -> PathBuf {
        self.data_dir.join("schedules.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AppConfig::default();
        assert_eq!(config.snapraid_binary, "snapraid");
        assert_eq!(config.history_limit, 50);
        assert!(config.log_dir.is_none());
        assert_eq!(
            config.schedules_path(),
            PathBuf::from("/var/lib/snapweb/schedules.json")
        );
    }
}
