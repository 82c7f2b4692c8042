//! Seams to the outside world: where status comes from and how pushes arrive.

use crate::error::Result;
use crate::song::{SongView, StatusSnapshot};
use async_trait::async_trait;
use futures::stream::BoxStream;
use url::Url;

/// Read side of the REST backend.
///
/// Implementations should not retry on their own; the sync channel's next
/// poll tick or push notification is the retry.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Returns a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// Fetch the current and next song.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, a non-success status or a body
    /// that cannot be decoded.
    async fn fetch_status(&self) -> Result<StatusSnapshot>;

    /// Fetch the queued songs in play order.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`StatusSource::fetch_status`].
    async fn fetch_playlist(&self) -> Result<Vec<SongView>>;
}

/// Inbound text frames of an open push channel.
///
/// The stream ending means the server closed the channel; an `Err` item means
/// the channel failed and will yield nothing further.
pub type PushStream = BoxStream<'static, Result<String>>;

/// Opens push channels.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Returns a human-readable name for this transport.
    fn name(&self) -> &'static str;

    /// Open a channel to `url`; resolves once the handshake is done.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or handshake fails.
    async fn open(&self, url: &Url) -> Result<PushStream>;
}
