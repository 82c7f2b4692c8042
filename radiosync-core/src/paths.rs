//! Path constants for configuration and local state files.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "radiosync";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The name of the persisted playback intent file (prefixed with . for hidden)
pub const INTENT_FILE_NAME: &str = ".state.json";

/// The name of the log file written when file logging is enabled
pub const LOG_FILE_NAME: &str = "radiosync.log";

/// Get the configuration directory path (~/.config/radiosync/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/radiosync/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the playback intent path (`~/.config/radiosync/.state.json`)
#[must_use]
pub fn intent_path() -> PathBuf {
    config_dir().join(INTENT_FILE_NAME)
}

/// Get the log file path (`~/.config/radiosync/radiosync.log`)
#[must_use]
pub fn log_file_path() -> PathBuf {
    config_dir().join(LOG_FILE_NAME)
}
