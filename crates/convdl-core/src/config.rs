use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Push-channel settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressChannelConfig {
    /// Open the push channel at session start.
    pub enabled: bool,
    /// Socket.IO mount path on the backend root.
    pub path: String,
    /// Upper bound on one long-poll request in seconds.
    pub poll_timeout_secs: u64,
    /// Delay before re-handshaking after a lost connection (0 = stay disconnected).
    pub reconnect_delay_secs: u64,
}

impl Default for ProgressChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/socket.io/".to_string(),
            poll_timeout_secs: 60,
            reconnect_delay_secs: 5,
        }
    }
}

/// Share hand-off settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub enabled: bool,
    /// Program and leading arguments; the artifact path is appended.
    /// When unset the platform opener is used (xdg-open / open / explorer).
    pub command: Option<Vec<String>>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

/// Global configuration loaded from `~/.config/convdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvdlConfig {
    /// Backend root; the conversion request goes to `{server_url}/download`.
    pub server_url: String,
    /// Connect timeout for every HTTP request, in seconds.
    pub connect_timeout_secs: u64,
    /// Deadline for the whole conversion request (None = transport default, no deadline).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Directory holding `downloaded-file.<format>` (None = `$XDG_DATA_HOME/convdl`).
    #[serde(default)]
    pub artifact_dir: Option<PathBuf>,
    #[serde(default)]
    pub progress_channel: ProgressChannelConfig,
    #[serde(default)]
    pub share: ShareConfig,
}

impl Default for ConvdlConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_secs: 30,
            request_timeout_secs: None,
            artifact_dir: None,
            progress_channel: ProgressChannelConfig::default(),
            share: ShareConfig::default(),
        }
    }
}

impl ConvdlConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    /// Artifact directory: the configured one, or the XDG data home for convdl.
    pub fn resolve_artifact_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.artifact_dir {
            return Ok(dir.clone());
        }
        app_data_dir()
    }
}

const APP_NAME: &str = "convdl";

/// XDG base directories scoped to convdl: every `get_*_home` already ends in `convdl/`.
fn xdg_dirs() -> Result<xdg::BaseDirectories> {
    xdg::BaseDirectories::with_prefix(APP_NAME).context("locate XDG base directories")
}

/// `$XDG_DATA_HOME/convdl`: default home of the artifacts.
pub fn app_data_dir() -> Result<PathBuf> {
    Ok(xdg_dirs()?.get_data_home())
}

/// `$XDG_STATE_HOME/convdl`: where the log file lives.
pub fn app_state_dir() -> Result<PathBuf> {
    Ok(xdg_dirs()?.get_state_home())
}

pub fn config_path() -> Result<PathBuf> {
    xdg_dirs()?
        .place_config_file("config.toml")
        .context("create config directory")
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ConvdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ConvdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<ConvdlConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: ConvdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
