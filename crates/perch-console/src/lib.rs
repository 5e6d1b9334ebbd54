//! Live console bridge.
//!
//! A long-lived WebSocket client for the panel's per-server console
//! socket: authenticates with an ephemeral token, streams console
//! output into a bounded ring buffer, tracks power state and resource
//! stats, and reconnects with bounded exponential backoff. One bridge
//! instance per viewed server.
//!
//! The protocol state machine ([`session::ConsoleSession`]) is pure and
//! separated from the socket IO loop ([`bridge::ConsoleBridge`]) so it
//! can be tested without a network.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod event;
pub mod session;

pub use bridge::{ConsoleBridge, ConsoleEndpoint, ConsoleUpdate, CredentialSource};
pub use buffer::ConsoleBuffer;
pub use config::{BridgeConfig, ReconnectPolicy};
pub use event::{ConsoleEvent, PowerState, ResourceStats};
pub use session::{BridgeState, ConsoleSession, SessionAction};

use thiserror::Error;

/// Console bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Fetching console credentials from the backend failed.
    #[error("Credential fetch failed: {0}")]
    Credentials(String),

    /// Socket-level connection failure (retryable).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The socket closed or the stream ended (retryable).
    #[error("Console stream ended: {0}")]
    Stream(String),
}
