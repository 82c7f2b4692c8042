//! WebSocket push channel.

use crate::error::EventsError;
use async_trait::async_trait;
use futures::StreamExt;
use radiosync_core::{CoreError, PushStream, PushTransport};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

/// Default time allowed for the opening handshake (10 seconds)
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens the server's `/api/events` channel with `tokio-tungstenite`.
///
/// Text frames are handed up as-is; binary, ping and pong frames are
/// swallowed. A close frame ends the stream, a protocol or I/O error ends it
/// with a single `Err`.
pub struct WebSocketTransport {
    handshake_timeout: Duration,
}

impl WebSocketTransport {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    async fn connect(&self, url: &Url) -> crate::error::Result<Socket> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(EventsError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (socket, response) = tokio::time::timeout(self.handshake_timeout, handshake)
            .await
            .map_err(|_| EventsError::HandshakeTimeout(self.handshake_timeout))??;
        debug!("Push channel handshake answered with {}", response.status());
        Ok(socket)
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    fn name(&self) -> &'static str {
        "websocket"
    }

    async fn open(&self, url: &Url) -> Result<PushStream, CoreError> {
        info!("Connecting push channel to {}", url);
        let socket = self.connect(url).await?;

        let frames = futures::stream::unfold(Some(socket), |state| async move {
            let mut socket = state?;
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return Some((Ok(text.to_string()), Some(socket)));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Push channel close frame: {:?}", frame);
                        return None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Some((Err(CoreError::from(EventsError::from(e))), None));
                    }
                    None => return None,
                }
            }
        });

        Ok(frames.boxed())
    }
}
