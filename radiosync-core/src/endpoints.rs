//! URL derivation for the radio backend.
//!
//! Every endpoint hangs off the configured server origin: the REST reads under
//! `/api/`, the push channel at `/api/events` on the upgraded scheme, and the
//! audio stream at the configured stream path.

use crate::error::{CoreError, Result};
use url::Url;

/// Path of the status endpoint
pub const STATUS_PATH: &str = "/api/";
/// Path of the playlist endpoint
pub const PLAYLIST_PATH: &str = "/api/playlist/";
/// Path of the push channel
pub const EVENTS_PATH: &str = "/api/events";

/// `GET` target returning `{current_song, next_song}`
///
/// # Errors
///
/// Returns an error if the base URL cannot be joined.
pub fn status_url(base: &Url) -> Result<Url> {
    Ok(base.join(STATUS_PATH)?)
}

/// `GET` target returning the queued songs
///
/// # Errors
///
/// Returns an error if the base URL cannot be joined.
pub fn playlist_url(base: &Url) -> Result<Url> {
    Ok(base.join(PLAYLIST_PATH)?)
}

/// Push channel URL: same origin, `http` upgraded to `ws` and `https` to `wss`.
///
/// # Errors
///
/// Returns an error if the base URL is not http(s).
pub fn push_channel_url(base: &Url) -> Result<Url> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(CoreError::ConfigInvalid {
                message: format!("cannot derive a push channel from scheme {other}"),
            })
        }
    };

    let mut url = base.join(EVENTS_PATH)?;
    url.set_scheme(scheme).map_err(|()| CoreError::ConfigInvalid {
        message: format!("cannot switch {base} to {scheme}"),
    })?;
    Ok(url)
}

/// Audio stream URL without the cache-busting query.
///
/// # Errors
///
/// Returns an error if the stream path cannot be joined.
pub fn stream_url(base: &Url, stream_path: &str) -> Result<Url> {
    Ok(base.join(stream_path)?)
}

/// Stream URL whose query is the given timestamp, so the player always starts
/// from the live edge instead of a cached buffer.
#[must_use]
pub fn cache_busted(stream: &Url, timestamp_ms: i64) -> Url {
    let mut url = stream.clone();
    url.set_query(Some(&timestamp_ms.to_string()));
    url
}
