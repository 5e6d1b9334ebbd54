//! WebSocket IO loop around a [`ConsoleSession`].
//!
//! Maintains a persistent connection to the panel's console socket with
//! automatic reconnection. Credentials are ephemeral, so every reconnect
//! (and every `token expiring` event) triggers a fresh credential fetch.

use std::future::Future;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::BridgeError;
use crate::config::BridgeConfig;
use crate::event::{self, PowerState, ResourceStats};
use crate::session::{BridgeState, ConsoleSession, SessionAction};

/// Where to connect and how to authenticate, as handed out by the panel.
#[derive(Debug, Clone)]
pub struct ConsoleEndpoint {
    pub socket_url: String,
    pub token: String,
}

/// Supplies fresh console credentials. Implemented against the panel's
/// client API in production and stubbed in tests.
pub trait CredentialSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<ConsoleEndpoint, BridgeError>> + Send;
}

/// Update fanned out to console subscribers.
#[derive(Debug, Clone)]
pub enum ConsoleUpdate {
    Line(String),
    Status(PowerState),
    Stats(ResourceStats),
    State(BridgeState),
    EulaPrompt,
}

enum ConnectOutcome {
    /// Owner asked us to stop.
    Shutdown,
    /// The panel warned the token is about to expire; reconnect with
    /// fresh credentials.
    RefreshCredentials,
}

/// Reconnecting console bridge. One instance per viewed server.
pub struct ConsoleBridge<S> {
    config: BridgeConfig,
    source: Arc<S>,
    session: Mutex<ConsoleSession>,
    updates: broadcast::Sender<ConsoleUpdate>,
    command_tx: mpsc::Sender<String>,
    command_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl<S: CredentialSource> ConsoleBridge<S> {
    pub fn new(config: BridgeConfig, source: Arc<S>) -> Self {
        let (updates, _) = broadcast::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);
        let session = Mutex::new(ConsoleSession::new(config.buffer_lines));
        Self {
            config,
            source,
            session,
            updates,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleUpdate> {
        self.updates.subscribe()
    }

    /// Buffered scrollback for a subscriber that joined late.
    pub async fn scrollback(&self) -> Vec<String> {
        self.session.lock().await.scrollback()
    }

    pub async fn state(&self) -> BridgeState {
        self.session.lock().await.state()
    }

    pub async fn power_state(&self) -> PowerState {
        self.session.lock().await.power_state()
    }

    /// Queue a user command for the server process.
    pub async fn send_command(&self, command: &str) -> Result<(), BridgeError> {
        self.command_tx
            .send(event::command_frame(command))
            .await
            .map_err(|_| BridgeError::Connection("Console bridge stopped".into()))
    }

    /// Run the bridge until shutdown or the reconnect budget is spent.
    ///
    /// The first credential fetch failing is terminal so the caller can
    /// report it to the user; fetch failures during reconnects are
    /// retried on the same backoff schedule as connection failures.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        let mut command_rx = self
            .command_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| BridgeError::Connection("Bridge already running".into()))?;

        let mut endpoint = self.source.fetch().await?;
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                self.set_state(BridgeState::Closed).await;
                info!("Console bridge shutting down");
                return Ok(());
            }

            let started = std::time::Instant::now();
            match self
                .connect_and_run(&endpoint, &mut command_rx, &mut shutdown)
                .await
            {
                Ok(ConnectOutcome::Shutdown) => {
                    self.set_state(BridgeState::Closed).await;
                    info!("Console bridge shutting down");
                    return Ok(());
                }
                Ok(ConnectOutcome::RefreshCredentials) => {
                    info!("Console token expiring, reconnecting with fresh credentials");
                    match self.source.fetch().await {
                        Ok(fresh) => endpoint = fresh,
                        Err(e) => {
                            warn!(error = %e, "Credential refresh failed, keeping current token");
                        }
                    }
                }
                Err(e) => {
                    // Reset backoff if the connection was up for >60s
                    if started.elapsed() > std::time::Duration::from_secs(60) {
                        attempt = 0;
                    }

                    if !self.config.reconnect.should_retry(attempt) {
                        self.set_state(BridgeState::GaveUp).await;
                        error!(error = %e, attempt, "Max console reconnect attempts reached");
                        return Err(e);
                    }

                    let delay = self.config.reconnect.delay_for_attempt(attempt);
                    warn!(error = %e, attempt, delay_ms = delay.as_millis(), "Console reconnecting");
                    self.set_state(BridgeState::Reconnecting { attempt }).await;

                    tokio::select! {
                        () = sleep(delay) => {}
                        _ = shutdown.changed() => {
                            self.set_state(BridgeState::Closed).await;
                            info!("Console bridge shutting down during reconnect wait");
                            return Ok(());
                        }
                    }

                    // The old token is almost certainly dead after a drop;
                    // fetch a fresh one before dialing again.
                    match self.source.fetch().await {
                        Ok(fresh) => endpoint = fresh,
                        Err(fetch_err) => {
                            warn!(error = %fetch_err, "Credential refetch failed, retrying with stale token");
                            self.emit(ConsoleUpdate::Line(format!(
                                "[perch] could not refresh console credentials: {fetch_err}"
                            )));
                        }
                    }

                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn connect_and_run(
        &self,
        endpoint: &ConsoleEndpoint,
        command_rx: &mut mpsc::Receiver<String>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ConnectOutcome, BridgeError> {
        let generation = self.session.lock().await.begin_connect();
        self.emit(ConsoleUpdate::State(BridgeState::Connecting));

        let (socket, _response) = connect_async(&endpoint.socket_url)
            .await
            .map_err(|e| BridgeError::Connection(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        if let Some(SessionAction::Send(frame)) = self
            .session
            .lock()
            .await
            .on_open(generation, &endpoint.token)
        {
            sink.send(Message::text(frame))
                .await
                .map_err(|e| BridgeError::Stream(e.to_string()))?;
        }

        loop {
            tokio::select! {
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let (before, actions) = {
                                let mut session = self.session.lock().await;
                                let before = session.state();
                                (before, session.on_text(generation, text.as_str()))
                            };
                            for action in actions {
                                match action {
                                    SessionAction::Send(frame) => {
                                        sink.send(Message::text(frame))
                                            .await
                                            .map_err(|e| BridgeError::Stream(e.to_string()))?;
                                    }
                                    SessionAction::RefreshCredentials => {
                                        return Ok(ConnectOutcome::RefreshCredentials);
                                    }
                                    SessionAction::Line(line) => {
                                        self.emit(ConsoleUpdate::Line(line));
                                    }
                                    SessionAction::Status(state) => {
                                        self.emit(ConsoleUpdate::Status(state));
                                    }
                                    SessionAction::Stats(stats) => {
                                        self.emit(ConsoleUpdate::Stats(stats));
                                    }
                                    SessionAction::EulaPrompt => {
                                        self.emit(ConsoleUpdate::EulaPrompt);
                                    }
                                }
                            }
                            let after = self.session.lock().await.state();
                            if after != before {
                                self.emit(ConsoleUpdate::State(after));
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            sink.send(Message::Pong(payload))
                                .await
                                .map_err(|e| BridgeError::Stream(e.to_string()))?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(frame = ?frame, "Console socket closed by panel");
                            return Err(BridgeError::Stream("Closed by panel".into()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(BridgeError::Stream(e.to_string()));
                        }
                        None => {
                            return Err(BridgeError::Stream("Stream ended by panel".into()));
                        }
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(frame) => {
                            sink.send(Message::text(frame))
                                .await
                                .map_err(|e| BridgeError::Stream(e.to_string()))?;
                        }
                        None => return Ok(ConnectOutcome::Shutdown),
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(ConnectOutcome::Shutdown);
                }
            }
        }
    }

    async fn set_state(&self, state: BridgeState) {
        {
            let mut session = self.session.lock().await;
            match state {
                BridgeState::Reconnecting { attempt } => session.on_reconnecting(attempt),
                BridgeState::GaveUp => session.on_gave_up(),
                BridgeState::Closed => session.on_closed(),
                _ => {}
            }
        }
        self.emit(ConsoleUpdate::State(state));
    }

    fn emit(&self, update: ConsoleUpdate) {
        // No subscribers is fine; the buffer still accumulates.
        let _ = self.updates.send(update);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::ReconnectPolicy;

    struct CountingSource {
        fetches: AtomicUsize,
    }

    impl CredentialSource for CountingSource {
        async fn fetch(&self) -> Result<ConsoleEndpoint, BridgeError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Nothing listens here, so every dial is refused.
            Ok(ConsoleEndpoint {
                socket_url: "ws://127.0.0.1:9".into(),
                token: "tok".into(),
            })
        }
    }

    struct FailingSource;

    impl CredentialSource for FailingSource {
        async fn fetch(&self) -> Result<ConsoleEndpoint, BridgeError> {
            Err(BridgeError::Credentials("panel said no".into()))
        }
    }

    fn fast_config(max_attempts: u32) -> BridgeConfig {
        BridgeConfig {
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                multiplier: 2.0,
                max_attempts: Some(max_attempts),
            },
            buffer_lines: 200,
        }
    }

    #[tokio::test]
    async fn refetches_credentials_on_every_reconnect_then_gives_up() {
        let source = Arc::new(CountingSource {
            fetches: AtomicUsize::new(0),
        });
        let bridge = ConsoleBridge::new(fast_config(2), Arc::clone(&source));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = bridge.run(shutdown_rx).await;
        assert!(result.is_err());
        assert_eq!(bridge.state().await, BridgeState::GaveUp);
        // Initial fetch plus one refetch per retry.
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn initial_credential_failure_is_terminal() {
        let bridge = ConsoleBridge::new(fast_config(10), Arc::new(FailingSource));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        match bridge.run(shutdown_rx).await {
            Err(BridgeError::Credentials(message)) => {
                assert_eq!(message, "panel said no");
            }
            other => panic!("expected credentials error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_run_is_rejected() {
        let source = Arc::new(CountingSource {
            fetches: AtomicUsize::new(0),
        });
        let bridge = ConsoleBridge::new(fast_config(0), source);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _ = bridge.run(shutdown_rx.clone()).await;

        match bridge.run(shutdown_rx).await {
            Err(BridgeError::Connection(message)) => {
                assert_eq!(message, "Bridge already running");
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn commands_queue_until_bridge_consumes_them() {
        let bridge = ConsoleBridge::new(fast_config(0), Arc::new(FailingSource));
        bridge.send_command("say hi").await.unwrap();
    }
}
