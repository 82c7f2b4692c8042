use radiosync_core::CoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while opening or reading the push channel.
#[derive(Debug, Error)]
pub enum EventsError {
    /// Connect, handshake or frame-level failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The handshake did not finish in time.
    #[error("WebSocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Invalid push channel URL {url}: expected ws or wss")]
    UnsupportedScheme { url: String },
}

impl From<EventsError> for CoreError {
    fn from(e: EventsError) -> Self {
        Self::PushChannel {
            reason: e.to_string(),
        }
    }
}

/// Convenience type alias for Results with `EventsError`.
pub type Result<T> = std::result::Result<T, EventsError>;
