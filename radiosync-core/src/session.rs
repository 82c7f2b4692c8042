//! One listening session: a playback controller and a sync channel sharing a
//! cancellation token.

use crate::channel::ReconnectDelays;
use crate::config::RadioConfig;
use crate::endpoints;
use crate::error::Result;
use crate::intent::IntentStore;
use crate::playback::{MediaElement, MediaEvent, PlaybackController, PlaybackSettings};
use crate::source::{PushTransport, StatusSource};
use crate::sync::{StatusBoard, StatusSyncChannel, SyncSettings};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Collaborators a session is assembled from.
pub struct SessionParts {
    pub media: Arc<dyn MediaElement>,
    pub intent_store: Arc<dyn IntentStore>,
    pub source: Arc<dyn StatusSource>,
    pub transport: Arc<dyn PushTransport>,
}

pub struct Session {
    controller: Arc<PlaybackController>,
    channel: Arc<StatusSyncChannel>,
    board: Arc<StatusBoard>,
    cancel_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Build a session, deriving stream and push URLs from the config.
    ///
    /// # Errors
    ///
    /// Returns an error if the server base URL is malformed or uses a scheme
    /// that has no push channel counterpart.
    pub fn new(
        config: &RadioConfig,
        parts: SessionParts,
        cancel_token: Option<CancellationToken>,
    ) -> Result<Self> {
        let cancel_token = cancel_token.unwrap_or_default();
        let base = config.server.base_url()?;

        let playback = PlaybackSettings {
            stream_url: endpoints::stream_url(&base, &config.server.stream_path)?,
            settle_delay: config.playback.settle_delay(),
            autoresume: config.playback.autoresume,
        };
        let sync = SyncSettings {
            push_url: endpoints::push_channel_url(&base)?,
            poll_interval: config.sync.poll_interval(),
            reconnect: ReconnectDelays {
                after_close: config.sync.reconnect_after_close(),
                after_error: config.sync.reconnect_after_error(),
            },
            sync_playlist: config.sync.sync_playlist,
        };

        let controller = PlaybackController::new(
            parts.media,
            parts.intent_store,
            playback,
            Some(cancel_token.child_token()),
        );
        let board = StatusBoard::new();
        let channel = Arc::new(StatusSyncChannel::new(
            parts.source,
            parts.transport,
            Arc::clone(&board),
            sync,
            Some(cancel_token.child_token()),
        ));

        Ok(Self {
            controller,
            channel,
            board,
            cancel_token,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the media event pump and status sync, then restore the
    /// persisted playback intent.
    pub async fn start(&self, media_events: mpsc::UnboundedReceiver<MediaEvent>) {
        info!("Starting session");
        {
            let mut tasks = self.tasks.lock().await;
            tasks.push(self.controller.attach(media_events));
            tasks.push(Arc::clone(&self.channel).start());
        }
        self.controller.bootstrap().await;
    }

    /// Cancel everything and wait for background tasks to finish.
    pub async fn stop(&self) {
        self.cancel_token.cancel();
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
        info!("Session stopped");
    }

    #[must_use]
    pub fn controller(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.controller)
    }

    #[must_use]
    pub fn channel(&self) -> Arc<StatusSyncChannel> {
        Arc::clone(&self.channel)
    }

    #[must_use]
    pub fn board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.board)
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}
