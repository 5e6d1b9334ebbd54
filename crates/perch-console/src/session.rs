//! Pure console session state machine.
//!
//! All protocol decisions live here, decoupled from socket IO: the bridge
//! feeds inbound text in and executes the returned actions. A generation
//! counter guards against frames from a superseded socket being applied
//! after a reconnect.

use tracing::{debug, warn};

use crate::buffer::ConsoleBuffer;
use crate::event::{self, ConsoleEvent, PowerState, ResourceStats};

/// Lifecycle of the bridge as observed by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Connecting,
    /// Socket open, waiting for `auth success`.
    Authenticating,
    Connected,
    Reconnecting { attempt: u32 },
    /// Reconnect budget exhausted; terminal.
    GaveUp,
    Closed,
}

/// Side effects the bridge must perform after feeding the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send a raw frame on the current socket.
    Send(String),
    /// Fetch fresh credentials and reconnect with them.
    RefreshCredentials,
    /// Forward a console line to subscribers.
    Line(String),
    Status(PowerState),
    Stats(ResourceStats),
    /// Surface the EULA acceptance dialog once.
    EulaPrompt,
}

pub struct ConsoleSession {
    state: BridgeState,
    buffer: ConsoleBuffer,
    power_state: PowerState,
    /// Identifies the socket currently allowed to mutate this session.
    generation: u64,
}

impl ConsoleSession {
    pub fn new(buffer_lines: usize) -> Self {
        Self {
            state: BridgeState::Connecting,
            buffer: ConsoleBuffer::new(buffer_lines),
            power_state: PowerState::Offline,
            generation: 0,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn power_state(&self) -> PowerState {
        self.power_state
    }

    /// Scrollback replayed to late subscribers, oldest first.
    pub fn scrollback(&self) -> Vec<String> {
        self.buffer.snapshot()
    }

    /// Start a new connection attempt. Returns the generation the new
    /// socket must present with every subsequent call.
    pub fn begin_connect(&mut self) -> u64 {
        self.generation += 1;
        self.state = BridgeState::Connecting;
        self.generation
    }

    /// Socket opened: authenticate. `None` when the socket is stale.
    pub fn on_open(&mut self, generation: u64, token: &str) -> Option<SessionAction> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Ignoring stale socket open");
            return None;
        }
        self.state = BridgeState::Authenticating;
        Some(SessionAction::Send(event::auth_frame(token)))
    }

    /// Process one inbound text frame from the socket.
    pub fn on_text(&mut self, generation: u64, text: &str) -> Vec<SessionAction> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "Dropping frame from stale socket");
            return Vec::new();
        }

        let parsed = match event::parse_event(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Discarding unparseable console frame");
                return Vec::new();
            }
        };

        match parsed {
            ConsoleEvent::AuthSuccess => {
                self.state = BridgeState::Connected;
                vec![SessionAction::Send(event::stats_request())]
            }
            ConsoleEvent::Status(state) => {
                self.power_state = state;
                vec![SessionAction::Status(state)]
            }
            ConsoleEvent::Output(line) => {
                self.buffer.push(line.clone());
                let mut actions = vec![SessionAction::Line(line)];
                if self.buffer.take_eula_prompt() {
                    actions.push(SessionAction::EulaPrompt);
                }
                actions
            }
            ConsoleEvent::Stats(stats) => {
                if let Some(state) = stats.state.as_deref() {
                    // stats frames also carry the power state; keep it fresh
                    // between explicit status events.
                    self.power_state = match state {
                        "starting" => PowerState::Starting,
                        "running" => PowerState::Running,
                        "stopping" => PowerState::Stopping,
                        _ => PowerState::Offline,
                    };
                }
                vec![SessionAction::Stats(stats)]
            }
            ConsoleEvent::TokenExpiring => vec![SessionAction::RefreshCredentials],
            ConsoleEvent::Other(tag) => {
                debug!(event = %tag, "Unhandled console event");
                Vec::new()
            }
        }
    }

    /// Socket dropped; a retry is scheduled.
    pub fn on_reconnecting(&mut self, attempt: u32) {
        self.state = BridgeState::Reconnecting { attempt };
    }

    /// Reconnect budget exhausted.
    pub fn on_gave_up(&mut self) {
        self.state = BridgeState::GaveUp;
    }

    /// Clean shutdown requested by the owner.
    pub fn on_closed(&mut self) {
        self.state = BridgeState::Closed;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn connected_session() -> (ConsoleSession, u64) {
        let mut session = ConsoleSession::new(200);
        let generation = session.begin_connect();
        session.on_open(generation, "tok").unwrap();
        let actions = session.on_text(generation, r#"{"event": "auth success"}"#);
        assert_eq!(actions.len(), 1);
        (session, generation)
    }

    #[test]
    fn open_sends_auth_then_success_requests_stats() {
        let mut session = ConsoleSession::new(200);
        let generation = session.begin_connect();
        let action = session.on_open(generation, "tok-1").unwrap();
        assert_eq!(
            action,
            SessionAction::Send(r#"{"event":"auth","args":["tok-1"]}"#.to_string())
        );
        assert_eq!(session.state(), BridgeState::Authenticating);

        let actions = session.on_text(generation, r#"{"event": "auth success"}"#);
        assert_eq!(
            actions,
            vec![SessionAction::Send(r#"{"event":"send stats"}"#.to_string())]
        );
        assert_eq!(session.state(), BridgeState::Connected);
    }

    #[test]
    fn output_lines_land_in_scrollback() {
        let (mut session, generation) = connected_session();
        session.on_text(
            generation,
            r#"{"event": "console output", "args": ["line one"]}"#,
        );
        session.on_text(
            generation,
            r#"{"event": "console output", "args": ["line two"]}"#,
        );
        assert_eq!(session.scrollback(), vec!["line one", "line two"]);
    }

    #[test]
    fn eula_line_raises_prompt_once() {
        let (mut session, generation) = connected_session();
        let actions = session.on_text(
            generation,
            r#"{"event": "console output", "args": ["You need to agree to the EULA in order to run the server"]}"#,
        );
        assert!(actions.contains(&SessionAction::EulaPrompt));
        let actions = session.on_text(
            generation,
            r#"{"event": "console output", "args": ["[Server] Done"]}"#,
        );
        assert!(!actions.contains(&SessionAction::EulaPrompt));
    }

    #[test]
    fn status_events_update_power_state() {
        let (mut session, generation) = connected_session();
        session.on_text(generation, r#"{"event": "status", "args": ["starting"]}"#);
        assert_eq!(session.power_state(), PowerState::Starting);
        session.on_text(generation, r#"{"event": "status", "args": ["running"]}"#);
        assert_eq!(session.power_state(), PowerState::Running);
    }

    #[test]
    fn stats_state_backfills_power_state() {
        let (mut session, generation) = connected_session();
        let frame = r#"{"event": "stats", "args": ["{\"memory_bytes\": 1, \"state\": \"running\"}"]}"#;
        let actions = session.on_text(generation, frame);
        assert!(matches!(actions.as_slice(), [SessionAction::Stats(_)]));
        assert_eq!(session.power_state(), PowerState::Running);
    }

    #[test]
    fn stats_actions_compare_by_value() {
        let (mut session, generation) = connected_session();
        let frame = r#"{"event": "stats", "args": ["{\"memory_bytes\": 1}"]}"#;
        let first = session.on_text(generation, frame);
        let second = session.on_text(generation, frame);
        assert_eq!(first, second);
        assert!(matches!(first.as_slice(), [SessionAction::Stats(_)]));
    }

    #[test]
    fn token_expiring_requests_fresh_credentials() {
        let (mut session, generation) = connected_session();
        let actions = session.on_text(generation, r#"{"event": "token expiring"}"#);
        assert_eq!(actions, vec![SessionAction::RefreshCredentials]);
    }

    #[test]
    fn stale_generation_frames_are_dropped() {
        let (mut session, old_generation) = connected_session();
        let new_generation = session.begin_connect();
        assert_ne!(old_generation, new_generation);

        // A late frame from the superseded socket must not touch state.
        let actions = session.on_text(
            old_generation,
            r#"{"event": "console output", "args": ["ghost"]}"#,
        );
        assert!(actions.is_empty());
        assert!(session.scrollback().is_empty() || !session.scrollback().contains(&"ghost".to_string()));
        assert!(session.on_open(old_generation, "tok").is_none());
    }

    #[test]
    fn reconnect_states_are_tracked() {
        let (mut session, _) = connected_session();
        session.on_reconnecting(3);
        assert_eq!(session.state(), BridgeState::Reconnecting { attempt: 3 });
        session.on_gave_up();
        assert_eq!(session.state(), BridgeState::GaveUp);
    }
}
