//! Push channel lifecycle as a pure state machine.
//!
//! [`ChannelMachine`] decides *what* should happen when the channel opens,
//! closes, fails, or a timer fires; the async driver in [`crate::sync`]
//! carries the resulting [`ChannelAction`]s out. Keeping the two apart lets
//! the reconnect rules be tested without sockets or clocks.

use serde::Deserialize;
use std::time::Duration;

/// Logical state of the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text frame pushed by the server: `{"action": "EVENT", "event": "update"}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushMessage {
    pub action: String,
    #[serde(default)]
    pub event: Option<String>,
}

impl PushMessage {
    /// Parse a text frame, returning `None` for anything that is not JSON of
    /// the expected shape.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Whether this frame announces new server state.
    #[must_use]
    pub fn is_update(&self) -> bool {
        self.action == "EVENT" && self.event.as_deref() == Some("update")
    }
}

/// Something that happened to the channel or its timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    Start,
    Opened,
    Message(PushMessage),
    Closed,
    Errored,
    PollTick,
    ReconnectDue,
}

/// Side effect the driver must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    /// Fetch status (and playlist) and publish it
    Refresh,
    StartPolling,
    StopPolling,
    /// Open the push channel
    Connect,
    /// Feed [`ChannelInput::ReconnectDue`] back after the delay
    ScheduleReconnect(Duration),
}

/// Fixed reconnect delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectDelays {
    pub after_close: Duration,
    pub after_error: Duration,
}

impl Default for ReconnectDelays {
    fn default() -> Self {
        Self {
            after_close: Duration::from_secs(1),
            after_error: Duration::from_secs(5),
        }
    }
}

/// Reconnect and polling rules for the push channel.
///
/// Invariants: polling is active exactly when the machine is started and not
/// [`ChannelState::Connected`]; at most one reconnect is pending; a connect is
/// only issued from [`ChannelState::Disconnected`] with nothing pending.
#[derive(Debug, Clone)]
pub struct ChannelMachine {
    state: ChannelState,
    delays: ReconnectDelays,
    started: bool,
    polling: bool,
    reconnect_pending: bool,
}

impl ChannelMachine {
    #[must_use]
    pub const fn new(delays: ReconnectDelays) -> Self {
        Self {
            state: ChannelState::Disconnected,
            delays,
            started: false,
            polling: false,
            reconnect_pending: false,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    #[must_use]
    pub const fn is_polling(&self) -> bool {
        self.polling
    }

    #[must_use]
    pub const fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Advance the machine and return the effects to perform, in order.
    pub fn handle(&mut self, input: ChannelInput) -> Vec<ChannelAction> {
        let mut actions = Vec::new();

        match input {
            ChannelInput::Start => {
                if self.started {
                    return actions;
                }
                self.started = true;
                // Bootstrap fetch so the display is never empty while negotiating
                actions.push(ChannelAction::Refresh);
                self.start_polling(&mut actions);
                self.connect(&mut actions);
            }
            ChannelInput::Opened => {
                if self.state != ChannelState::Connecting {
                    return actions;
                }
                self.state = ChannelState::Connected;
                if self.polling {
                    self.polling = false;
                    actions.push(ChannelAction::StopPolling);
                }
                // Catch up on anything missed while negotiating
                actions.push(ChannelAction::Refresh);
            }
            ChannelInput::Message(message) => {
                if self.state == ChannelState::Connected && message.is_update() {
                    actions.push(ChannelAction::Refresh);
                }
            }
            ChannelInput::Closed => {
                if self.state == ChannelState::Disconnected {
                    return actions;
                }
                self.state = ChannelState::Disconnected;
                self.start_polling(&mut actions);
                self.schedule_reconnect(self.delays.after_close, &mut actions);
            }
            ChannelInput::Errored => {
                if self.state == ChannelState::Disconnected {
                    return actions;
                }
                self.state = ChannelState::Disconnected;
                // An error likely means an update was missed
                actions.push(ChannelAction::Refresh);
                self.start_polling(&mut actions);
                self.schedule_reconnect(self.delays.after_error, &mut actions);
            }
            ChannelInput::PollTick => {
                if self.polling && self.state != ChannelState::Connected {
                    actions.push(ChannelAction::Refresh);
                }
            }
            ChannelInput::ReconnectDue => {
                self.reconnect_pending = false;
                self.connect(&mut actions);
            }
        }

        actions
    }

    fn start_polling(&mut self, actions: &mut Vec<ChannelAction>) {
        if !self.polling {
            self.polling = true;
            actions.push(ChannelAction::StartPolling);
        }
    }

    fn connect(&mut self, actions: &mut Vec<ChannelAction>) {
        if self.state == ChannelState::Disconnected && !self.reconnect_pending {
            self.state = ChannelState::Connecting;
            actions.push(ChannelAction::Connect);
        }
    }

    fn schedule_reconnect(&mut self, delay: Duration, actions: &mut Vec<ChannelAction>) {
        if !self.reconnect_pending {
            self.reconnect_pending = true;
            actions.push(ChannelAction::ScheduleReconnect(delay));
        }
    }
}
