use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Agent configuration, read once at startup.
///
/// Lives at `<config dir>/shiftwatch/config.json`; a missing or unreadable
/// file falls back to defaults so a fresh install starts without setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Endpoint answering "is this user clocked in right now?".
    pub clock_status_url: String,
    /// Endpoint ingesting captured screenshots.
    pub screenshot_upload_url: String,
    /// Seconds between capture ticks.
    pub capture_interval_secs: u64,
    /// Seconds between clock-status polls. Kept shorter than the capture
    /// interval so the cached clock state is never stale when a capture
    /// tick fires.
    pub poll_interval_secs: u64,
    /// Override for the agent data directory (store, pid file).
    pub data_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            clock_status_url: "https://api.shiftwatch.app/api/users/clock-status".into(),
            screenshot_upload_url: "https://api.shiftwatch.app/api/monitoring/screenshots".into(),
            capture_interval_secs: 60,
            poll_interval_secs: 30,
            data_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    /// Loads from the conventional config path, or defaults when the
    /// platform reports no config directory.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs(self.capture_interval_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shiftwatch").join("config.json"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("shiftwatch"))
        .unwrap_or_else(|| PathBuf::from(".shiftwatch"))
}

/// Debug mode, toggled via SHIFTWATCH_DEBUG.
pub fn debug_mode() -> bool {
    std::env::var("SHIFTWATCH_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
