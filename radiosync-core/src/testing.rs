//! Test doubles for the media element, status source and push transport.

use crate::error::{CoreError, Result};
use crate::playback::MediaElement;
use crate::song::{SongView, StatusSnapshot};
use crate::source::{PushStream, PushTransport, StatusSource};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

pub fn song(title: &str) -> SongView {
    SongView {
        title: title.to_string(),
        duration_seconds: Some(200.0),
        external_id: format!("youtube:{title}"),
        preview_url: String::new(),
        attribution_user: None,
        upvotes: Some(0),
        downvotes: Some(0),
    }
}

pub fn snapshot(current: &str) -> StatusSnapshot {
    StatusSnapshot {
        current_song: Some(song(current)),
        next_song: None,
    }
}

#[derive(Default)]
pub struct MockMedia {
    pub playing: AtomicBool,
    pub muted: AtomicBool,
    pub reject_play: AtomicBool,
    pub plays: AtomicUsize,
    pub src: Mutex<Option<Url>>,
}

#[async_trait]
impl MediaElement for MockMedia {
    fn is_paused(&self) -> bool {
        !self.playing.load(Ordering::SeqCst)
    }

    fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn set_src(&self, src: &Url) {
        *self.src.lock().unwrap() = Some(src.clone());
    }

    async fn play(&self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(CoreError::PlaybackRejected {
                reason: "autoplay blocked".into(),
            });
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }
}

/// Scripted status response: wait `delay`, then return `result`.
pub type Scripted<T> = (Duration, Result<T>);

/// Status source answering from scripts, falling back to a fixed snapshot.
#[derive(Default)]
pub struct MockSource {
    pub status_calls: AtomicUsize,
    pub playlist_calls: AtomicUsize,
    pub status_script: Mutex<VecDeque<Scripted<StatusSnapshot>>>,
    pub playlist_fails: AtomicBool,
}

impl MockSource {
    pub fn script_status(&self, delay: Duration, result: Result<StatusSnapshot>) {
        self.status_script.lock().unwrap().push_back((delay, result));
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn playlist_calls(&self) -> usize {
        self.playlist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status_script.lock().unwrap().pop_front();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(snapshot("default")),
        }
    }

    async fn fetch_playlist(&self) -> Result<Vec<SongView>> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        if self.playlist_fails.load(Ordering::SeqCst) {
            return Err(CoreError::FetchFailed {
                resource: "playlist".into(),
                reason: "503".into(),
            });
        }
        Ok(vec![song("queued-1"), song("queued-2")])
    }
}

/// Push transport handing out pre-made channels; fails once they run out.
pub struct MockTransport {
    channels: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<String>>>>,
    open_delay: Duration,
    pub opens: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn failing(open_delay: Duration) -> Self {
        Self {
            channels: Mutex::new(VecDeque::new()),
            open_delay,
            opens: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Queue one channel; the returned sender plays the server side.
    pub fn add_channel(&self) -> mpsc::UnboundedSender<Result<String>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.lock().unwrap().push_back(rx);
        tx
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, _url: &Url) -> Result<PushStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.open_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let channel = self.channels.lock().unwrap().pop_front();
        match channel {
            Some(rx) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            None => Err(CoreError::PushChannel {
                reason: "connection refused".into(),
            }),
        }
    }
}
