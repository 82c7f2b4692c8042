use crate::error::{CoreError, Result};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default polling interval while the push channel is down
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
/// Shortest allowed polling interval
pub const MIN_POLL_INTERVAL_MS: u64 = 1000;
/// Longest allowed polling interval
pub const MAX_POLL_INTERVAL_MS: u64 = 5000;
/// Reconnect delay after the push channel closed cleanly
pub const DEFAULT_RECONNECT_AFTER_CLOSE_MS: u64 = 1000;
/// Reconnect delay after the push channel failed
pub const DEFAULT_RECONNECT_AFTER_ERROR_MS: u64 = 5000;
/// Wait between "can play" and unmuting
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;
/// Path of the live audio stream relative to the server base URL
pub const DEFAULT_STREAM_PATH: &str = "/mpd.ogg";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Origin of the radio backend, e.g. `https://radio.example.com`
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
}

fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}

impl ServerConfig {
    /// Parse the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed.
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_reconnect_after_close")]
    pub reconnect_after_close_ms: u64,
    #[serde(default = "default_reconnect_after_error")]
    pub reconnect_after_error_ms: u64,
    /// Also refresh the queued playlist on every trigger
    #[serde(default = "default_true")]
    pub sync_playlist: bool,
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_reconnect_after_close() -> u64 {
    DEFAULT_RECONNECT_AFTER_CLOSE_MS
}

const fn default_reconnect_after_error() -> u64 {
    DEFAULT_RECONNECT_AFTER_ERROR_MS
}

const fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            reconnect_after_close_ms: default_reconnect_after_close(),
            reconnect_after_error_ms: default_reconnect_after_error(),
            sync_playlist: true,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn reconnect_after_close(&self) -> Duration {
        Duration::from_millis(self.reconnect_after_close_ms)
    }

    #[must_use]
    pub const fn reconnect_after_error(&self) -> Duration {
        Duration::from_millis(self.reconnect_after_error_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Resume playback on startup when the last intent was "play"
    #[serde(default = "default_true")]
    pub autoresume: bool,
}

const fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            autoresume: true,
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Static bearer token for mutating calls
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for mutating calls; status reads are never retried
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_retries() -> u32 {
    2
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl RadioConfig {
    /// Get the configuration directory path (~/.config/radiosync/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/radiosync/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location or create a template on first run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after writing the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `config_path` or create a template there.
    ///
    /// # Errors
    ///
    /// See [`RadioConfig::load_or_create`].
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields and value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.server.base_url.trim().is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "server.base_url".to_string(),
            });
        }

        let base = self.server.base_url()?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "server.base_url must use http or https, got {}",
                    base.scheme()
                ),
            });
        }

        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.sync.poll_interval_ms) {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "sync.poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and \
                    {MAX_POLL_INTERVAL_MS}, got {}",
                    self.sync.poll_interval_ms
                ),
            });
        }

        Ok(())
    }
}

/// Template written on first run.
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Radiosync Configuration
# ~/.config/radiosync/config.toml

[server]
# Required: origin of the radio backend
base_url = ""
stream_path = ""#,
    DEFAULT_STREAM_PATH,
    r#""

[sync]
# Polling fallback while the push channel is down (1000-5000)
poll_interval_ms = "#,
    DEFAULT_POLL_INTERVAL_MS,
    r"
reconnect_after_close_ms = ",
    DEFAULT_RECONNECT_AFTER_CLOSE_MS,
    r"
reconnect_after_error_ms = ",
    DEFAULT_RECONNECT_AFTER_ERROR_MS,
    r#"
sync_playlist = true

[playback]
settle_delay_ms = "#,
    DEFAULT_SETTLE_DELAY_MS,
    r#"
# Resume the stream on startup if it was playing when you quit
autoresume = true

[auth]
# Optional: bearer token for search, download, vote and claim
# token = ""

[http]
timeout_secs = 10
max_retries = 2

[logging]
# Also write logs to ~/.config/radiosync/radiosync.log
enabled = false
"#
);
