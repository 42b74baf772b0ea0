//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! auth server URL, the idle timeout parameters and the remembered login
//! email.
//!
//! Configuration is stored at `~/.config/vtrack/config.json`; `VTRACK_*`
//! environment variables override individual fields after loading.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::session::{IdleSettings, SessionSettings, SettingsError, DEFAULT_BOOTSTRAP_FALLBACK};
use crate::session::idle::{DEFAULT_IDLE_TIMEOUT, DEFAULT_WARNING_LEAD};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "vtrack";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server_url: String,
    pub idle_timeout_secs: u64,
    pub warning_lead_secs: u64,
    pub bootstrap_fallback_secs: u64,
    pub request_timeout_secs: u64,
    pub remembered_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
            warning_lead_secs: DEFAULT_WARNING_LEAD.as_secs(),
            bootstrap_fallback_secs: DEFAULT_BOOTSTRAP_FALLBACK.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            remembered_email: None,
        }
    }
}

impl Config {
    /// Load from disk (defaults when the file is missing), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `VTRACK_*` overrides. Unparseable numbers are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("VTRACK_SERVER_URL").filter(|s| !s.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(email) = lookup("VTRACK_EMAIL").filter(|s| !s.trim().is_empty()) {
            self.remembered_email = Some(email);
        }

        let numeric = [
            ("VTRACK_IDLE_TIMEOUT_SECS", &mut self.idle_timeout_secs),
            ("VTRACK_WARNING_LEAD_SECS", &mut self.warning_lead_secs),
            ("VTRACK_BOOTSTRAP_FALLBACK_SECS", &mut self.bootstrap_fallback_secs),
        ];
        for (key, field) in numeric {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse::<u64>() {
                    Ok(value) => *field = value,
                    Err(_) => warn!(key, value = %raw, "Ignoring non-numeric override"),
                }
            }
        }
    }

    pub fn session_settings(&self) -> Result<SessionSettings, SettingsError> {
        let idle = IdleSettings::new(
            Duration::from_secs(self.idle_timeout_secs),
            Duration::from_secs(self.warning_lead_secs),
        )?;
        Ok(SessionSettings {
            idle,
            bootstrap_fallback: Duration::from_secs(self.bootstrap_fallback_secs),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the log file
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
