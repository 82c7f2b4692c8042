mod commands;
mod media;

use crate::commands::{Command, HELP};
use crate::media::HttpStreamElement;
use radiosync_api::RadioApiClient;
use radiosync_core::{
    CoreError, FileIntentStore, PlaybackEvent, RadioConfig, Session, SessionParts, StatusBoard,
    SyncEvent,
};
use radiosync_events::WebSocketTransport;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    // Check config for logging.enabled before full config load
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let config = match RadioConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            println!(
                "A configuration file has been created at {}.\n\
                Set server.base_url (and auth.token to queue songs), then run radiosync again.",
                path.display()
            );
            std::process::exit(0);
        }
        Err(CoreError::ConfigParseError(parse_error)) => {
            eprintln!(
                "Your configuration file at {} has a syntax error and cannot be loaded:\n\n\
                {parse_error}",
                RadioConfig::config_path().display()
            );
            std::process::exit(1);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Create shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = runtime.block_on(run(config, cancel_token)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: RadioConfig, cancel_token: CancellationToken) -> Result<(), CoreError> {
    let api = Arc::new(RadioApiClient::from_config(&config).map_err(|e| {
        CoreError::ConfigInvalid {
            message: e.to_string(),
        }
    })?);

    // The stream never ends on its own, so only the connect phase is bounded
    let stream_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .map_err(|e| CoreError::ConfigInvalid {
            message: format!("failed to build stream client: {e}"),
        })?;
    let (media, media_events) = HttpStreamElement::new(stream_client);

    let session = Session::new(
        &config,
        SessionParts {
            media: Arc::new(media),
            intent_store: Arc::new(FileIntentStore::default_location()),
            source: api.clone(),
            transport: Arc::new(WebSocketTransport::new()),
        },
        Some(cancel_token.clone()),
    )?;

    tokio::spawn(log_sync_events(session.board()));
    tokio::spawn(log_playback_events(session.controller().subscribe()));

    session.start(media_events).await;
    info!("Type `h` for commands");

    read_commands(&session, &api, &cancel_token).await;

    session.stop().await;
    Ok(())
}

/// Dispatch stdin commands until `q`, EOF, or cancellation
async fn read_commands(session: &Session, api: &RadioApiClient, cancel_token: &CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
        };

        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Toggle => session.controller().toggle().await,
            Command::NowPlaying => print_now_playing(&session.board()).await,
            Command::Search { provider, query } => match api.search(&provider, &query).await {
                Ok(results) if results.is_empty() => println!("No results"),
                Ok(results) => {
                    for result in results {
                        println!("{}  {}", result.external_id, result.title);
                    }
                }
                Err(e) => warn!("Search failed: {}", e),
            },
            Command::Download { external_id } => {
                if let Err(e) = api.download(&external_id, true).await {
                    warn!("Download failed: {}", e);
                }
            }
            Command::Vote {
                external_id,
                direction,
            } => {
                if let Err(e) = api.vote(&external_id, direction).await {
                    warn!("Vote failed: {}", e);
                }
            }
            Command::Claim { external_id } => {
                if let Err(e) = api.claim(&external_id).await {
                    warn!("Claim failed: {}", e);
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }
}

async fn print_now_playing(board: &StatusBoard) {
    let snapshot = board.snapshot().await;
    println!("Now playing: {}", snapshot.current_title());
    println!("Up next:     {}", snapshot.next_title());

    for song in board.playlist().await {
        let rating = song.rating_label().unwrap_or_default();
        let by = song
            .attribution_user
            .as_deref()
            .map(|user| format!(" (queued by {user})"))
            .unwrap_or_default();
        println!(
            "  {:>5}  {:>3}  {}{}",
            song.duration_label(),
            rating,
            song.title,
            by
        );
    }
}

/// Log all sync events to the console
async fn log_sync_events(board: Arc<StatusBoard>) {
    let mut rx = board.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => match &event {
                SyncEvent::StatusUpdated { snapshot } => {
                    info!(
                        "Now playing: {} | Up next: {}",
                        snapshot.current_title(),
                        snapshot.next_title()
                    );
                }
                SyncEvent::PlaylistUpdated { playlist } => {
                    info!("Playlist updated: {} songs", playlist.len());
                }
                SyncEvent::ChannelStateChanged { state } => {
                    info!("Push channel {}", state);
                }
                SyncEvent::RefreshFailed { resource, message } => {
                    warn!("Could not refresh {}: {}", resource, message);
                }
            },
            Err(RecvError::Closed) => {
                info!("Sync event channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!("Missed {} sync events", n);
            }
        }
    }
}

async fn log_playback_events(mut rx: tokio::sync::broadcast::Receiver<PlaybackEvent>) {
    loop {
        match rx.recv().await {
            Ok(PlaybackEvent::StateChanged { state, label }) => {
                info!("Playback {:?} [{}]", state, label);
            }
            Ok(PlaybackEvent::IntentChanged { intent }) => {
                info!("Playback intent saved: {}", intent);
            }
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(n)) => {
                info!("Missed {} playback events", n);
            }
        }
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading to set up tracing first.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let config_path = RadioConfig::config_path();
    let Ok(content) = std::fs::read_to_string(&config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tungstenite=warn,tokio_tungstenite=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if file_logging_enabled {
        let log_path = radiosync_core::paths::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
