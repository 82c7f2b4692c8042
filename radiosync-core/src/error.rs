use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Configuration errors
    #[error(
        "Config file not found at {path}. A template has been created - \
        please set server.base_url and restart."
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("Missing required config field: {field}")]
    ConfigMissingField { field: String },

    #[error("Failed to parse config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // Status source errors
    #[error("Fetching {resource} failed: {reason}")]
    FetchFailed { resource: String, reason: String },

    // Push channel errors
    #[error("Push channel failed: {reason}")]
    PushChannel { reason: String },

    // Playback errors
    #[error("Playback could not start: {reason}")]
    PlaybackRejected { reason: String },

    // Intent store errors
    #[error("Failed to serialize playback intent: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
