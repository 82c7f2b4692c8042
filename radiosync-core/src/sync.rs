use crate::channel::{
    ChannelAction, ChannelInput, ChannelMachine, ChannelState, PushMessage, ReconnectDelays,
};
use crate::song::{SongView, StatusSnapshot};
use crate::source::{PushStream, PushTransport, StatusSource};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Events emitted by the status board
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A fresh status snapshot replaced the previous one
    StatusUpdated { snapshot: StatusSnapshot },
    /// A fresh playlist replaced the previous one
    PlaylistUpdated { playlist: Vec<SongView> },
    /// The push channel changed state
    ChannelStateChanged { state: ChannelState },
    /// A fetch failed; the last-known-good data stays in place
    RefreshFailed { resource: &'static str, message: String },
}

/// Display-side state
struct StatusBoardInner {
    snapshot: StatusSnapshot,
    playlist: Vec<SongView>,
    channel_state: ChannelState,
}

/// Latest server state as seen by this client, plus change notifications.
pub struct StatusBoard {
    inner: RwLock<StatusBoardInner>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl StatusBoard {
    /// Create a new, empty status board
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to sync events
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the status snapshot wholesale
    /// Events go out under the write lock so their order matches the writes.
    pub async fn publish_status(&self, snapshot: StatusSnapshot) {
        let mut inner = self.inner.write().await;
        inner.snapshot = snapshot.clone();
        let _ = self.event_tx.send(SyncEvent::StatusUpdated { snapshot });
    }

    /// Replace the playlist wholesale
    pub async fn publish_playlist(&self, playlist: Vec<SongView>) {
        let mut inner = self.inner.write().await;
        inner.playlist = playlist.clone();
        let _ = self.event_tx.send(SyncEvent::PlaylistUpdated { playlist });
    }

    /// Record a push channel transition
    pub async fn set_channel_state(&self, state: ChannelState) {
        let mut inner = self.inner.write().await;
        if std::mem::replace(&mut inner.channel_state, state) != state {
            let _ = self.event_tx.send(SyncEvent::ChannelStateChanged { state });
        }
    }

    /// Report a failed fetch without touching the stored data
    pub fn report_failure(&self, resource: &'static str, message: String) {
        let _ = self.event_tx.send(SyncEvent::RefreshFailed { resource, message });
    }

    /// Get the current snapshot
    pub async fn snapshot(&self) -> StatusSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    /// Get the current playlist
    pub async fn playlist(&self) -> Vec<SongView> {
        self.inner.read().await.playlist.clone()
    }

    /// Get the push channel state
    pub async fn channel_state(&self) -> ChannelState {
        self.inner.read().await.channel_state
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(StatusBoardInner {
                snapshot: StatusSnapshot::default(),
                playlist: Vec::new(),
                channel_state: ChannelState::Disconnected,
            }),
            event_tx,
        }
    }
}

/// Settings the sync channel needs from the config.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub push_url: Url,
    pub poll_interval: Duration,
    pub reconnect: ReconnectDelays,
    /// Also refresh the playlist on every trigger
    pub sync_playlist: bool,
}

/// Keeps the [`StatusBoard`] fresh: push channel first, polling as fallback.
pub struct StatusSyncChannel {
    source: Arc<dyn StatusSource>,
    transport: Arc<dyn PushTransport>,
    board: Arc<StatusBoard>,
    settings: SyncSettings,
    cancel_token: CancellationToken,
}

impl StatusSyncChannel {
    /// Create a new sync channel
    ///
    /// # Arguments
    /// * `source` - REST reads for status and playlist
    /// * `transport` - Opens the push channel
    /// * `board` - Where fetched data is published
    /// * `settings` - Push URL and timing
    /// * `cancel_token` - Optional external cancellation token for graceful shutdown
    pub fn new(
        source: Arc<dyn StatusSource>,
        transport: Arc<dyn PushTransport>,
        board: Arc<StatusBoard>,
        settings: SyncSettings,
        cancel_token: Option<CancellationToken>,
    ) -> Self {
        Self {
            source,
            transport,
            board,
            settings,
            cancel_token: cancel_token.unwrap_or_default(),
        }
    }

    /// Get the board this channel publishes to
    #[must_use]
    pub fn board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.board)
    }

    /// Get the cancellation token for this channel
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Signal the channel to stop
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    /// Start syncing in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Fetch status (and playlist) and publish whatever arrives.
    ///
    /// Returns immediately. Overlapping refreshes are fine: each fetch
    /// publishes on completion, so the last one to finish wins. The two
    /// fetches are independent and one failing leaves the other alone.
    pub fn refresh(&self) {
        let source = Arc::clone(&self.source);
        let board = Arc::clone(&self.board);
        let cancel = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = source.fetch_status() => match result {
                    Ok(snapshot) => {
                        debug!(
                            "Status: now {} / next {}",
                            snapshot.current_title(),
                            snapshot.next_title()
                        );
                        board.publish_status(snapshot).await;
                    }
                    Err(e) => {
                        warn!("Status fetch from {} failed: {}", source.name(), e);
                        board.report_failure("status", e.to_string());
                    }
                },
            }
        });

        if !self.settings.sync_playlist {
            return;
        }

        let source = Arc::clone(&self.source);
        let board = Arc::clone(&self.board);
        let cancel = self.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                result = source.fetch_playlist() => match result {
                    Ok(playlist) => {
                        debug!("Playlist: {} songs", playlist.len());
                        board.publish_playlist(playlist).await;
                    }
                    Err(e) => {
                        warn!("Playlist fetch from {} failed: {}", source.name(), e);
                        board.report_failure("playlist", e.to_string());
                    }
                },
            }
        });
    }

    /// Run the sync loop until cancelled
    pub async fn run(&self) {
        info!(
            "Starting status sync via {} (push channel {}, polling every {:?})",
            self.transport.name(),
            self.settings.push_url,
            self.settings.poll_interval
        );

        let mut machine = ChannelMachine::new(self.settings.reconnect);
        let mut driver = Driver::default();

        let actions = machine.handle(ChannelInput::Start);
        driver.apply(self, actions);
        self.board.set_channel_state(machine.state()).await;

        loop {
            let input = tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Status sync shutting down");
                    break;
                }
                () = next_tick(&mut driver.poll) => ChannelInput::PollTick,
                () = wait_reconnect(&mut driver.reconnect) => {
                    driver.reconnect = None;
                    ChannelInput::ReconnectDue
                }
                result = wait_open(&mut driver.opening) => {
                    driver.opening = None;
                    match result {
                        Ok(stream) => {
                            info!("Push channel open");
                            driver.stream = Some(stream);
                            ChannelInput::Opened
                        }
                        Err(e) => {
                            warn!("Push channel failed to open: {}", e);
                            ChannelInput::Errored
                        }
                    }
                }
                frame = next_frame(&mut driver.stream) => match frame {
                    Some(Ok(text)) => {
                        if let Some(message) = PushMessage::parse(&text) {
                            debug!("Push message: {:?}", message);
                            ChannelInput::Message(message)
                        } else {
                            debug!("Ignoring unparseable push frame: {}", text);
                            continue;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Push channel error: {}", e);
                        driver.stream = None;
                        ChannelInput::Errored
                    }
                    None => {
                        info!("Push channel closed");
                        driver.stream = None;
                        ChannelInput::Closed
                    }
                },
            };

            let actions = machine.handle(input);
            driver.apply(self, actions);
            self.board.set_channel_state(machine.state()).await;
        }

        self.board.set_channel_state(ChannelState::Disconnected).await;
    }
}

/// Timers and channel handle owned by the sync loop; only the loop writes them.
#[derive(Default)]
struct Driver {
    poll: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
    opening: Option<BoxFuture<'static, crate::error::Result<PushStream>>>,
    stream: Option<PushStream>,
}

impl Driver {
    fn apply(&mut self, channel: &StatusSyncChannel, actions: Vec<ChannelAction>) {
        for action in actions {
            debug!("Channel action: {:?}", action);
            match action {
                ChannelAction::Refresh => channel.refresh(),
                ChannelAction::StartPolling => {
                    if self.poll.is_none() {
                        let period = channel.settings.poll_interval;
                        let mut interval =
                            tokio::time::interval_at(Instant::now() + period, period);
                        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        self.poll = Some(interval);
                    }
                }
                ChannelAction::StopPolling => self.poll = None,
                ChannelAction::Connect => {
                    if self.opening.is_none() && self.stream.is_none() {
                        let transport = Arc::clone(&channel.transport);
                        let url = channel.settings.push_url.clone();
                        self.opening = Some(async move { transport.open(&url).await }.boxed());
                    }
                }
                ChannelAction::ScheduleReconnect(delay) => {
                    debug!("Reconnecting in {:?}", delay);
                    self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
                }
            }
        }
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_reconnect(reconnect: &mut Option<Pin<Box<Sleep>>>) {
    match reconnect {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn wait_open(
    opening: &mut Option<BoxFuture<'static, crate::error::Result<PushStream>>>,
) -> crate::error::Result<PushStream> {
    match opening {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(stream: &mut Option<PushStream>) -> Option<crate::error::Result<String>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::testing::{snapshot, MockSource, MockTransport};
    use std::sync::atomic::Ordering;

    const UPDATE: &str = r#"{"action": "EVENT", "event": "update"}"#;

    fn settings(poll_ms: u64) -> SyncSettings {
        SyncSettings {
            push_url: Url::parse("ws://radio.local/api/events").unwrap(),
            poll_interval: Duration::from_millis(poll_ms),
            reconnect: ReconnectDelays::default(),
            sync_playlist: true,
        }
    }

    fn channel(
        source: &Arc<MockSource>,
        transport: &Arc<MockTransport>,
        settings: SyncSettings,
    ) -> Arc<StatusSyncChannel> {
        Arc::new(StatusSyncChannel::new(
            source.clone(),
            transport.clone(),
            StatusBoard::new(),
            settings,
            None,
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_fetches_last_completion_wins() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let channel = channel(&source, &transport, settings(5000));

        // A starts first but completes last
        source.script_status(Duration::from_millis(200), Ok(snapshot("A")));
        source.script_status(Duration::from_millis(50), Ok(snapshot("B")));
        channel.refresh();
        channel.refresh();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(channel.board().snapshot().await.current_title(), "B");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(channel.board().snapshot().await.current_title(), "A");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishes_emit_in_write_order() {
        let board = StatusBoard::new();
        let mut rx = board.subscribe();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let board = board.clone();
                tokio::spawn(async move { board.publish_status(snapshot(&format!("S{i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::StatusUpdated { snapshot } = event {
                last = Some(snapshot.current_title().to_owned());
            }
        }
        assert_eq!(last.as_deref(), Some(board.snapshot().await.current_title()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_last_known_good() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let channel = channel(&source, &transport, settings(5000));
        let mut rx = channel.board().subscribe();

        source.script_status(Duration::ZERO, Ok(snapshot("Keep me")));
        source.script_status(
            Duration::ZERO,
            Err(CoreError::FetchFailed {
                resource: "status".into(),
                reason: "502".into(),
            }),
        );

        channel.refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        channel.refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(channel.board().snapshot().await.current_title(), "Keep me");

        let mut failures = 0;
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::RefreshFailed { resource, .. } = event {
                assert_eq!(resource, "status");
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playlist_failure_does_not_block_status() {
        let source = Arc::new(MockSource::default());
        source.playlist_fails.store(true, Ordering::SeqCst);
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let channel = channel(&source, &transport, settings(5000));

        source.script_status(Duration::from_millis(30), Ok(snapshot("Still here")));
        channel.refresh();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(channel.board().snapshot().await.current_title(), "Still here");
        assert!(channel.board().playlist().await.is_empty());
        assert_eq!(source.playlist_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_only_when_playlist_sync_disabled() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let channel = channel(
            &source,
            &transport,
            SyncSettings {
                sync_playlist: false,
                ..settings(5000)
            },
        );

        channel.refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.status_calls(), 1);
        assert_eq!(source.playlist_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_connecting_channel_still_polls() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::from_secs(3)));
        let channel = channel(&source, &transport, settings(2000));
        let handle = Arc::clone(&channel).start();

        tokio::time::sleep(Duration::from_millis(10_500)).await;

        // Bootstrap plus a poll every 2s, plus one catch-up per failed open
        assert!(source.status_calls() >= 6, "got {}", source.status_calls());
        // Opens at 0s and 8s (3s handshake timeout + 5s error delay)
        assert_eq!(transport.opens(), 2);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_ne!(channel.board().channel_state().await, ChannelState::Connected);

        channel.stop();
        handle.await.unwrap();
        assert_eq!(channel.board().channel_state().await, ChannelState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connected_channel_cancels_polling() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let server = transport.add_channel();
        let channel = channel(&source, &transport, settings(1000));
        let handle = Arc::clone(&channel).start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(channel.board().channel_state().await, ChannelState::Connected);
        // Bootstrap plus the catch-up on open
        assert_eq!(source.status_calls(), 2);

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(source.status_calls(), 2);

        server.send(Ok(UPDATE.to_string())).unwrap();
        server.send(Ok(r#"{"action": "EVENT", "event": "other"}"#.to_string())).unwrap();
        server.send(Ok("garbage".to_string())).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.status_calls(), 3);
        assert_eq!(source.playlist_calls(), 3);

        // Server goes away: polling resumes, reconnects keep failing
        drop(server);
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(source.status_calls() >= 6, "got {}", source.status_calls());
        assert_ne!(channel.board().channel_state().await, ChannelState::Connected);

        channel.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_error_triggers_catch_up_and_reconnect() {
        let source = Arc::new(MockSource::default());
        let transport = Arc::new(MockTransport::failing(Duration::ZERO));
        let first = transport.add_channel();
        let second = transport.add_channel();
        let channel = channel(&source, &transport, settings(5000));
        let mut rx = channel.board().subscribe();
        let handle = Arc::clone(&channel).start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let before = source.status_calls();

        first
            .send(Err(CoreError::PushChannel {
                reason: "reset by peer".into(),
            }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(source.status_calls(), before + 1);
        assert_eq!(transport.opens(), 1);

        // Error delay is 5s, then the second channel opens
        tokio::time::sleep(Duration::from_millis(5_000)).await;
        assert_eq!(transport.opens(), 2);
        assert_eq!(channel.board().channel_state().await, ChannelState::Connected);

        let mut states = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::ChannelStateChanged { state } = event {
                states.push(state);
            }
        }
        assert_eq!(
            states,
            vec![
                ChannelState::Connecting,
                ChannelState::Connected,
                ChannelState::Disconnected,
                ChannelState::Connecting,
                ChannelState::Connected,
            ]
        );

        drop(second);
        channel.stop();
        handle.await.unwrap();
    }
}
