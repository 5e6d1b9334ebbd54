//! Server-side console bridges.
//!
//! One [`ConsoleBridge`] per viewed server, created lazily and kept
//! across requests so the scrollback survives page reloads. Credentials
//! come from the panel's client API on every (re)connect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use perch_console::bridge::{ConsoleEndpoint, CredentialSource};
use perch_console::{BridgeConfig, BridgeError, BridgeState, ConsoleBridge, PowerState};
use perch_panel::client_api::ClientApiClient;

/// Fetches console credentials for one server through the client API.
pub struct PanelCredentialSource {
    client: Arc<ClientApiClient>,
    identifier: String,
}

impl CredentialSource for PanelCredentialSource {
    async fn fetch(&self) -> Result<ConsoleEndpoint, BridgeError> {
        let credentials = self
            .client
            .console_credentials(&self.identifier)
            .await
            .map_err(|e| BridgeError::Credentials(e.to_string()))?;
        Ok(ConsoleEndpoint {
            socket_url: credentials.socket,
            token: credentials.token,
        })
    }
}

struct ConsoleHandle {
    bridge: Arc<ConsoleBridge<PanelCredentialSource>>,
    shutdown: watch::Sender<bool>,
}

/// Point-in-time view of a server's console.
pub struct ConsoleSnapshot {
    pub state: BridgeState,
    pub power_state: PowerState,
    pub lines: Vec<String>,
}

/// Owns the live console bridges for this process.
pub struct ConsoleManager {
    client: Arc<ClientApiClient>,
    config: BridgeConfig,
    bridges: Mutex<HashMap<String, ConsoleHandle>>,
}

impl ConsoleManager {
    pub fn new(client: Arc<ClientApiClient>) -> Self {
        Self {
            client,
            config: BridgeConfig::default(),
            bridges: Mutex::new(HashMap::new()),
        }
    }

    fn bridge_for(&self, identifier: &str) -> Arc<ConsoleBridge<PanelCredentialSource>> {
        let mut bridges = self
            .bridges
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = bridges.get(identifier) {
            return Arc::clone(&handle.bridge);
        }

        debug!(identifier, "Starting console bridge");
        let source = Arc::new(PanelCredentialSource {
            client: Arc::clone(&self.client),
            identifier: identifier.to_string(),
        });
        let bridge = Arc::new(ConsoleBridge::new(self.config.clone(), source));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let runner = Arc::clone(&bridge);
        let ident = identifier.to_string();
        tokio::spawn(async move {
            if let Err(e) = runner.run(shutdown_rx).await {
                warn!(identifier = %ident, error = %e, "Console bridge stopped");
            }
        });

        bridges.insert(
            identifier.to_string(),
            ConsoleHandle {
                bridge: Arc::clone(&bridge),
                shutdown,
            },
        );
        bridge
    }

    /// Current console view for a server, starting the bridge on first use.
    pub async fn snapshot(&self, identifier: &str) -> ConsoleSnapshot {
        let bridge = self.bridge_for(identifier);
        ConsoleSnapshot {
            state: bridge.state().await,
            power_state: bridge.power_state().await,
            lines: bridge.scrollback().await,
        }
    }

    /// Forward a command through the live bridge, if one is running.
    pub async fn send_command(&self, identifier: &str, command: &str) -> Result<(), BridgeError> {
        let bridge = self.bridge_for(identifier);
        bridge.send_command(command).await
    }

    /// Stop and drop the bridge for a server (e.g. when it is deleted).
    pub fn close(&self, identifier: &str) {
        let mut bridges = self
            .bridges
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = bridges.remove(identifier) {
            let _ = handle.shutdown.send(true);
        }
    }
}
