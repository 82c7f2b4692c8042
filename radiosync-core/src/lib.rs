pub mod channel;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod intent;
pub mod paths;
pub mod playback;
pub mod session;
pub mod song;
pub mod source;
pub mod sync;

#[cfg(test)]
mod testing;

pub use channel::{
    ChannelAction, ChannelInput, ChannelMachine, ChannelState, PushMessage, ReconnectDelays,
};
pub use config::{
    AuthConfig, HttpConfig, LoggingConfig, PlaybackConfig, RadioConfig, ServerConfig, SyncConfig,
    CONFIG_TEMPLATE,
};
pub use error::{CoreError, Result};
pub use intent::{FileIntentStore, IntentStore, MemoryIntentStore, PlaybackIntent};
pub use paths::{
    config_dir, intent_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, INTENT_FILE_NAME,
    LOG_FILE_NAME,
};
pub use playback::{
    ControlLabel, MediaElement, MediaEvent, PlaybackController, PlaybackEvent, PlaybackSettings,
    PlaybackState,
};
pub use session::{Session, SessionParts};
pub use song::{
    format_duration, format_rating, song_title, SongRecord, SongView, StatusRecord, StatusSnapshot,
};
pub use source::{PushStream, PushTransport, StatusSource};
pub use sync::{StatusBoard, StatusSyncChannel, SyncEvent, SyncSettings};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
