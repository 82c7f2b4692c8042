//! The user's last explicit play/pause choice and where it is kept.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Last explicit play/pause choice, independent of buffering state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackIntent {
    Play,
    Pause,
}

impl PlaybackIntent {
    /// Value stored in the intent slot.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
        }
    }

    /// Parse a stored value. Anything other than the two literals is ignored.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlaybackIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-slot key-value storage for the playback intent.
pub trait IntentStore: Send + Sync {
    /// Read the persisted intent, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<PlaybackIntent>>;

    /// Overwrite the persisted intent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, intent: PlaybackIntent) -> Result<()>;
}

/// On-disk layout: `{"state": "play"}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct IntentFile {
    #[serde(default)]
    state: Option<String>,
}

/// Intent slot persisted as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileIntentStore {
    path: PathBuf,
}

impl FileIntentStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/radiosync/.state.json`
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(crate::paths::intent_path())
    }
}

impl IntentStore for FileIntentStore {
    fn load(&self) -> Result<Option<PlaybackIntent>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let file: IntentFile = serde_json::from_str(&content)?;
        let intent = file.state.as_deref().and_then(PlaybackIntent::parse);
        debug!("Loaded playback intent {:?} from {:?}", intent, self.path);
        Ok(intent)
    }

    fn save(&self, intent: PlaybackIntent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = IntentFile {
            state: Some(intent.as_str().to_string()),
        };
        fs::write(&self.path, serde_json::to_string(&file)?)?;
        Ok(())
    }
}

/// Intent slot that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryIntentStore {
    intent: RwLock<Option<PlaybackIntent>>,
}

impl MemoryIntentStore {
    #[must_use]
    pub fn new(intent: Option<PlaybackIntent>) -> Self {
        Self {
            intent: RwLock::new(intent),
        }
    }
}

impl IntentStore for MemoryIntentStore {
    fn load(&self) -> Result<Option<PlaybackIntent>> {
        Ok(*self.intent.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, intent: PlaybackIntent) -> Result<()> {
        *self.intent.write().unwrap_or_else(PoisonError::into_inner) = Some(intent);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("radiosync-intent-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_intent_as_str() {
        assert_eq!(PlaybackIntent::Play.as_str(), "play");
        assert_eq!(PlaybackIntent::Pause.as_str(), "pause");
    }

    #[test]
    fn test_intent_parse() {
        assert_eq!(PlaybackIntent::parse("play"), Some(PlaybackIntent::Play));
        assert_eq!(PlaybackIntent::parse("pause"), Some(PlaybackIntent::Pause));
        assert_eq!(PlaybackIntent::parse("PLAY"), None);
        assert_eq!(PlaybackIntent::parse(""), None);
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = FileIntentStore::new(temp_path("missing.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_literal() {
        let path = temp_path("persist.json");
        let store = FileIntentStore::new(&path);

        store.save(PlaybackIntent::Play).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"state":"play"}"#);
        assert_eq!(store.load().unwrap(), Some(PlaybackIntent::Play));

        store.save(PlaybackIntent::Pause).unwrap();
        assert_eq!(FileIntentStore::new(&path).load().unwrap(), Some(PlaybackIntent::Pause));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_file_store_ignores_unknown_value() {
        let path = temp_path("unknown.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"state":"rewind"}"#).unwrap();

        assert_eq!(FileIntentStore::new(&path).load().unwrap(), None);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryIntentStore::default();
        assert_eq!(store.load().unwrap(), None);
        store.save(PlaybackIntent::Play).unwrap();
        assert_eq!(store.load().unwrap(), Some(PlaybackIntent::Play));
    }
}
