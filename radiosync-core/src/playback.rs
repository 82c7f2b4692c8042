//! Playback control for the single live-stream audio element.
//!
//! The element itself stays behind [`MediaElement`]; the controller only
//! turns toggles and media lifecycle events into [`PlaybackState`]
//! transitions and keeps the persisted [`PlaybackIntent`] current.

use crate::endpoints;
use crate::error::Result;
use crate::intent::{IntentStore, PlaybackIntent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Transient playback state; lives only as long as the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Playing,
    Paused,
    Failed,
}

impl PlaybackState {
    /// Label shown on the play/pause control
    #[must_use]
    pub const fn label(&self) -> ControlLabel {
        match self {
            Self::Idle | Self::Paused | Self::Failed => ControlLabel::Play,
            Self::Buffering => ControlLabel::Buffering,
            Self::Playing => ControlLabel::Pause,
        }
    }
}

/// Text on the play/pause control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlLabel {
    Play,
    Buffering,
    Pause,
}

impl ControlLabel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Play => "Play!",
            Self::Buffering => "Buffering...",
            Self::Pause => "Pause",
        }
    }
}

impl std::fmt::Display for ControlLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle signals reported by a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    LoadStart,
    CanPlay,
    CanPlayThrough,
    Pause,
    Error,
}

/// The audio element driven by the controller.
///
/// Implementations report lifecycle changes as [`MediaEvent`]s through the
/// channel handed to [`PlaybackController::attach`].
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Whether the element is paused. This is the source of truth for toggling.
    fn is_paused(&self) -> bool;

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// Replace the media source and restart loading.
    fn set_src(&self, src: &Url);

    /// Start playback.
    ///
    /// # Errors
    ///
    /// Returns an error if playback is rejected (autoplay policy, decode or
    /// network failure).
    async fn play(&self) -> Result<()>;

    fn pause(&self);
}

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// State (and therefore possibly the control label) changed
    StateChanged {
        state: PlaybackState,
        label: ControlLabel,
    },
    /// A toggle recorded a new intent
    IntentChanged { intent: PlaybackIntent },
}

/// Settings the controller needs from the config.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Stream URL without the cache-busting query
    pub stream_url: Url,
    pub settle_delay: Duration,
    pub autoresume: bool,
}

struct ControllerInner {
    state: PlaybackState,
    /// Last play attempt was rejected; suppresses the buffering label
    failed: bool,
    /// Bumped on every toggle and pause; a settle timer only fires for the
    /// generation it was scheduled in
    generation: u64,
}

/// State machine over [`PlaybackState`] for one media element.
pub struct PlaybackController {
    media: Arc<dyn MediaElement>,
    intent_store: Arc<dyn IntentStore>,
    settings: PlaybackSettings,
    inner: RwLock<ControllerInner>,
    event_tx: broadcast::Sender<PlaybackEvent>,
    cancel_token: CancellationToken,
}

impl PlaybackController {
    /// Create a new controller
    ///
    /// # Arguments
    /// * `media` - The audio element to drive
    /// * `intent_store` - Slot holding the last play/pause choice
    /// * `settings` - Stream URL and timing
    /// * `cancel_token` - Optional external cancellation token; cancels pending settle timers
    pub fn new(
        media: Arc<dyn MediaElement>,
        intent_store: Arc<dyn IntentStore>,
        settings: PlaybackSettings,
        cancel_token: Option<CancellationToken>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);

        Arc::new(Self {
            media,
            intent_store,
            settings,
            inner: RwLock::new(ControllerInner {
                state: PlaybackState::Idle,
                failed: false,
                generation: 0,
            }),
            event_tx,
            cancel_token: cancel_token.unwrap_or_default(),
        })
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.event_tx.subscribe()
    }

    /// Get current playback state
    pub async fn state(&self) -> PlaybackState {
        self.inner.read().await.state
    }

    /// Get the current control label
    pub async fn label(&self) -> ControlLabel {
        self.state().await.label()
    }

    /// Restore the persisted intent. A stored "play" resumes the stream as if
    /// the user had clicked; anything else leaves the control idle.
    pub async fn bootstrap(&self) {
        let intent = match self.intent_store.load() {
            Ok(intent) => intent,
            Err(e) => {
                warn!("Failed to read playback intent: {}", e);
                None
            }
        };

        if intent == Some(PlaybackIntent::Play) && self.settings.autoresume {
            info!("Resuming playback from persisted intent");
            self.publish_state(PlaybackState::Buffering).await;
            self.toggle().await;
        } else {
            self.publish_state(PlaybackState::Idle).await;
        }
    }

    /// Flip between playing and paused, based on the element's paused flag.
    pub async fn toggle(&self) {
        self.next_generation().await;

        if self.media.is_paused() {
            self.record_intent(PlaybackIntent::Play);

            let src = endpoints::cache_busted(
                &self.settings.stream_url,
                chrono::Utc::now().timestamp_millis(),
            );
            debug!("Loading stream from {}", src);

            self.inner.write().await.failed = false;
            self.media.set_src(&src);
            // Muted start keeps autoplay policies from rejecting the stream
            self.media.set_muted(true);

            if let Err(e) = self.media.play().await {
                warn!("Playback did not start: {}", e);
                self.inner.write().await.failed = true;
                self.set_state(PlaybackState::Failed).await;
            }
        } else {
            self.record_intent(PlaybackIntent::Pause);
            self.media.pause();
        }
    }

    /// Apply a media element lifecycle event.
    pub async fn handle_media_event(self: &Arc<Self>, event: MediaEvent) {
        debug!("Media event: {:?}", event);

        match event {
            MediaEvent::LoadStart => {
                let failed = self.inner.read().await.failed;
                if !failed {
                    self.set_state(PlaybackState::Buffering).await;
                }
            }
            MediaEvent::CanPlay | MediaEvent::CanPlayThrough => self.schedule_settle().await,
            MediaEvent::Pause => {
                self.next_generation().await;
                self.set_state(PlaybackState::Paused).await;
            }
            MediaEvent::Error => {
                self.inner.write().await.failed = true;
                self.set_state(PlaybackState::Failed).await;
            }
        }
    }

    /// Pump media events from the element into the state machine until the
    /// channel closes or the controller is cancelled.
    #[must_use]
    pub fn attach(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<MediaEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = this.cancel_token.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => this.handle_media_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Media event pump stopped");
        })
    }

    /// Unmute after the settle delay unless the element was paused meanwhile.
    /// Both the paused flag and the generation are checked when the timer
    /// fires, not when it is set, so a pause followed by a fresh play inside
    /// the delay still drops the old timer.
    async fn schedule_settle(self: &Arc<Self>) {
        let generation = self.inner.read().await.generation;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = this.cancel_token.cancelled() => {}
                () = tokio::time::sleep(this.settings.settle_delay) => {
                    let current = this.inner.read().await.generation;
                    if this.media.is_paused() {
                        debug!("Element paused during settle delay, staying muted");
                    } else if current != generation {
                        debug!("Playback restarted during settle delay, dropping stale timer");
                    } else {
                        this.media.set_muted(false);
                        this.set_state(PlaybackState::Playing).await;
                    }
                }
            }
        });
    }

    async fn next_generation(&self) {
        let mut inner = self.inner.write().await;
        inner.generation = inner.generation.wrapping_add(1);
    }

    fn record_intent(&self, intent: PlaybackIntent) {
        if let Err(e) = self.intent_store.save(intent) {
            warn!("Failed to persist playback intent {}: {}", intent, e);
        }
        let _ = self.event_tx.send(PlaybackEvent::IntentChanged { intent });
    }

    /// Transition, emitting an event only when the state actually changes
    async fn set_state(&self, state: PlaybackState) {
        let old = {
            let mut inner = self.inner.write().await;
            std::mem::replace(&mut inner.state, state)
        };

        if old != state {
            info!("Playback {:?} -> {:?}", old, state);
            let _ = self.event_tx.send(PlaybackEvent::StateChanged {
                state,
                label: state.label(),
            });
        }
    }

    /// Transition and always emit, so a fresh label sink gets a first value
    async fn publish_state(&self, state: PlaybackState) {
        self.inner.write().await.state = state;
        let _ = self.event_tx.send(PlaybackEvent::StateChanged {
            state,
            label: state.label(),
        });
    }
}
