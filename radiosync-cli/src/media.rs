//! Terminal stand-in for an audio element.
//!
//! The tap pulls the live stream over HTTP and discards the bytes, reporting
//! the same lifecycle events a browser audio element would.

use async_trait::async_trait;
use futures::StreamExt;
use radiosync_core::{CoreError, MediaElement, MediaEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Progress is logged every this many bytes
const PROGRESS_LOG_BYTES: u64 = 1024 * 1024;

fn lock(state: &Mutex<TapState>) -> MutexGuard<'_, TapState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

struct TapState {
    src: Option<Url>,
    paused: bool,
    muted: bool,
    reader: Option<JoinHandle<()>>,
}

pub struct HttpStreamElement {
    client: reqwest::Client,
    events: mpsc::UnboundedSender<MediaEvent>,
    state: Arc<Mutex<TapState>>,
}

impl HttpStreamElement {
    /// Create a paused element plus the receiver for its lifecycle events.
    #[must_use]
    pub fn new(client: reqwest::Client) -> (Self, mpsc::UnboundedReceiver<MediaEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let element = Self {
            client,
            events,
            state: Arc::new(Mutex::new(TapState {
                src: None,
                paused: true,
                muted: false,
                reader: None,
            })),
        };
        (element, rx)
    }

    fn state(&self) -> MutexGuard<'_, TapState> {
        lock(&self.state)
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl MediaElement for HttpStreamElement {
    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn is_muted(&self) -> bool {
        self.state().muted
    }

    fn set_muted(&self, muted: bool) {
        let mut state = self.state();
        if state.muted != muted {
            info!("Audio {}", if muted { "muted" } else { "unmuted" });
        }
        state.muted = muted;
    }

    fn set_src(&self, src: &Url) {
        let mut state = self.state();
        if let Some(reader) = state.reader.take() {
            reader.abort();
        }
        state.src = Some(src.clone());
    }

    async fn play(&self) -> Result<(), CoreError> {
        let src = self.state().src.clone().ok_or_else(|| CoreError::PlaybackRejected {
            reason: "no source set".into(),
        })?;

        self.emit(MediaEvent::LoadStart);
        debug!("Opening stream {}", src);

        let response = match self.client.get(src.clone()).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                self.emit(MediaEvent::Error);
                return Err(CoreError::PlaybackRejected {
                    reason: format!("stream returned status {}", response.status()),
                });
            }
            Err(e) => {
                self.emit(MediaEvent::Error);
                return Err(CoreError::PlaybackRejected {
                    reason: e.to_string(),
                });
            }
        };

        self.state().paused = false;

        let events = self.events.clone();
        let shared = Arc::clone(&self.state);
        let reader = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut total: u64 = 0;
            let mut announced = false;

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        if !announced {
                            announced = true;
                            let _ = events.send(MediaEvent::CanPlayThrough);
                        }
                        let before = total / PROGRESS_LOG_BYTES;
                        total += u64::try_from(bytes.len()).unwrap_or(u64::MAX);
                        if total / PROGRESS_LOG_BYTES > before {
                            debug!("Streamed {} bytes", total);
                        }
                    }
                    Err(e) => {
                        warn!("Stream read failed: {}", e);
                        lock(&shared).paused = true;
                        let _ = events.send(MediaEvent::Error);
                        return;
                    }
                }
            }

            info!("Stream ended after {} bytes", total);
            lock(&shared).paused = true;
            let _ = events.send(MediaEvent::Pause);
        });

        if let Some(previous) = self.state().reader.replace(reader) {
            previous.abort();
        }
        Ok(())
    }

    fn pause(&self) {
        let was_playing = {
            let mut state = self.state();
            if let Some(reader) = state.reader.take() {
                reader.abort();
            }
            !std::mem::replace(&mut state.paused, true)
        };
        if was_playing {
            self.emit(MediaEvent::Pause);
        }
    }
}
