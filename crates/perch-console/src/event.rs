//! Console socket wire events.
//!
//! Frames are JSON objects `{"event": "...", "args": [...]}` in both
//! directions. The panel's vocabulary: `auth`, `auth success`, `status`,
//! `console output`, `stats`, `send stats`, `token expiring`.

use serde::{Deserialize, Serialize};

/// Raw inbound frame before dispatch.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

/// Outbound frame.
#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<&'a str>,
}

/// Server lifecycle state reported over the console socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    #[default]
    Offline,
    Starting,
    Running,
    Stopping,
}

impl PowerState {
    fn parse(raw: &str) -> Self {
        match raw {
            "starting" => Self::Starting,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            _ => Self::Offline,
        }
    }
}

/// Resource usage snapshot embedded in a `stats` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    #[serde(default)]
    pub memory_bytes: u64,
    #[serde(default)]
    pub memory_limit_bytes: u64,
    #[serde(default)]
    pub cpu_absolute: f64,
    #[serde(default)]
    pub disk_bytes: u64,
    #[serde(default)]
    pub network: NetworkStats,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

/// Parsed inbound console event.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    AuthSuccess,
    Status(PowerState),
    Output(String),
    Stats(ResourceStats),
    TokenExpiring,
    /// Event tag this bridge does not dispatch on.
    Other(String),
}

/// Parse an inbound frame. The `stats` payload arrives as a JSON string
/// inside the first arg and is decoded in place.
pub fn parse_event(text: &str) -> Result<ConsoleEvent, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(text)?;
    let first_arg = || {
        frame
            .args
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    };
    Ok(match frame.event.as_str() {
        "auth success" => ConsoleEvent::AuthSuccess,
        "status" => ConsoleEvent::Status(PowerState::parse(first_arg())),
        "console output" => ConsoleEvent::Output(first_arg().to_string()),
        "stats" => {
            let stats = serde_json::from_str(first_arg()).unwrap_or_default();
            ConsoleEvent::Stats(stats)
        }
        "token expiring" => ConsoleEvent::TokenExpiring,
        _ => ConsoleEvent::Other(frame.event),
    })
}

/// Build the authentication frame sent on socket open.
pub fn auth_frame(token: &str) -> String {
    serde_json::to_string(&OutboundFrame {
        event: "auth",
        args: vec![token],
    })
    .unwrap_or_default()
}

/// Build a command frame forwarding user input to the server process.
pub fn command_frame(command: &str) -> String {
    serde_json::to_string(&OutboundFrame {
        event: "send command",
        args: vec![command],
    })
    .unwrap_or_default()
}

/// Build the initial stats-request frame sent after auth succeeds.
pub fn stats_request() -> String {
    serde_json::to_string(&OutboundFrame {
        event: "send stats",
        args: Vec::new(),
    })
    .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_auth_success() {
        let event = parse_event(r#"{"event": "auth success"}"#).unwrap();
        assert!(matches!(event, ConsoleEvent::AuthSuccess));
    }

    #[test]
    fn parses_status() {
        let event = parse_event(r#"{"event": "status", "args": ["running"]}"#).unwrap();
        assert!(matches!(event, ConsoleEvent::Status(PowerState::Running)));
        let event = parse_event(r#"{"event": "status", "args": ["weird"]}"#).unwrap();
        assert!(matches!(event, ConsoleEvent::Status(PowerState::Offline)));
    }

    #[test]
    fn parses_console_output() {
        let event =
            parse_event(r#"{"event": "console output", "args": ["[Server] Done (3.2s)!"]}"#)
                .unwrap();
        match event {
            ConsoleEvent::Output(line) => assert_eq!(line, "[Server] Done (3.2s)!"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_embedded_stats_json() {
        let frame = r#"{"event": "stats", "args": ["{\"memory_bytes\": 1048576, \"cpu_absolute\": 42.5, \"network\": {\"rx_bytes\": 10, \"tx_bytes\": 20}, \"state\": \"running\"}"]}"#;
        let event = parse_event(frame).unwrap();
        match event {
            ConsoleEvent::Stats(stats) => {
                assert_eq!(stats.memory_bytes, 1_048_576);
                assert!((stats.cpu_absolute - 42.5).abs() < f64::EPSILON);
                assert_eq!(stats.network.rx_bytes, 10);
                assert_eq!(stats.state.as_deref(), Some("running"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_stats_payload_degrades_to_default() {
        let event = parse_event(r#"{"event": "stats", "args": ["not json"]}"#).unwrap();
        match event {
            ConsoleEvent::Stats(stats) => assert_eq!(stats.memory_bytes, 0),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_preserved_as_other() {
        let event = parse_event(r#"{"event": "install output", "args": ["..."]}"#).unwrap();
        match event {
            ConsoleEvent::Other(tag) => assert_eq!(tag, "install output"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn auth_frame_carries_token() {
        assert_eq!(
            auth_frame("tok-123"),
            r#"{"event":"auth","args":["tok-123"]}"#
        );
    }

    #[test]
    fn command_frame_wraps_user_input() {
        assert_eq!(
            command_frame("say hello"),
            r#"{"event":"send command","args":["say hello"]}"#
        );
    }

    #[test]
    fn stats_request_has_no_args() {
        assert_eq!(stats_request(), r#"{"event":"send stats"}"#);
    }
}
