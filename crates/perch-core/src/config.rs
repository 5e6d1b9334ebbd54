//! Configuration resolution for Perch.
//!
//! Implements layered config resolution:
//! 1. Built-in defaults
//! 2. Config file (JSON, `--config` or ~/.config/perch/config.json)
//! 3. Environment variables
//! 4. CLI arguments (applied by the binary, highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Perch configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Path to the SQLite database file.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Local HTTP surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub log_level: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// External panel connection configuration.
///
/// Two credential classes: the "application" key drives user/server CRUD
/// and catalog reads; the "client" (account) key drives power actions,
/// command dispatch, file writes, and console-credential issuance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PanelConfig {
    /// Panel base URL (e.g., "<https://panel.example.com>").
    pub base_url: String,
    /// Application API key.
    pub application_key: String,
    /// Client (account) API key.
    pub client_key: String,
}

impl PanelConfig {
    /// Whether enough is configured to talk to the panel at all.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.application_key.is_empty()
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret for session tokens.
    pub secret: String,
    /// Session lifetime in seconds.
    pub ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            ttl_secs: 30 * 24 * 60 * 60, // 30 days
        }
    }
}

/// Load configuration with layered resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    let path = config_file
        .map(Path::to_path_buf)
        .or_else(global_config_path);
    if let Some(path) = path {
        if path.exists() {
            config = load_config_file(&path)?;
        } else if config_file.is_some() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Default config file location (~/.config/perch/config.json on Linux).
pub fn global_config_path() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .map(|p| p.join("perch").join("config.json"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("PERCH_BIND_ADDR") {
        config.http.bind_addr = val;
    }
    if let Ok(val) = std::env::var("PERCH_PANEL_URL") {
        config.panel.base_url = val;
    }
    if let Ok(val) = std::env::var("PERCH_PANEL_APP_KEY") {
        config.panel.application_key = val;
    }
    if let Ok(val) = std::env::var("PERCH_PANEL_CLIENT_KEY") {
        config.panel.client_key = val;
    }
    if let Ok(val) = std::env::var("PERCH_SESSION_SECRET") {
        config.session.secret = val;
    }
    if let Ok(val) = std::env::var("PERCH_DATABASE_PATH") {
        config.database_path = Some(PathBuf::from(val));
    }
}
