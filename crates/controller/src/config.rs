//! Controller runtime configuration (persisted as `controller.toml`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ControllerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_server_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    2
}

/// Path of the config file: `$XHARVEST_CONTROLLER_CONFIG` or
/// `controller.toml` next to the working directory.
pub fn config_file_path() -> PathBuf {
    std::env::var_os("XHARVEST_CONTROLLER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("controller.toml"))
}

/// Load the config, falling back to defaults when the file is absent.
pub fn load_config() -> Result<ControllerConfig> {
    load_config_from(&config_file_path())
}

pub fn load_config_from(path: &Path) -> Result<ControllerConfig> {
    if !path.exists() {
        return Ok(ControllerConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}
