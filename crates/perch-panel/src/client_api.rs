//! Client API client (account key).
//!
//! Runtime-control passthroughs requiring the higher-privilege account
//! credential class: power signals, raw command dispatch, file writes,
//! and console-credential issuance. All of these are mutations (or issue
//! live credentials), so every failure propagates to the caller.

use serde::{Deserialize, Serialize};

use crate::application::{api_error, build_client, urlencode};
use crate::types::{ConsoleCredentials, PowerSignal};
use crate::{PanelCredentials, PanelError};

#[derive(Debug, Serialize)]
struct PowerBody {
    signal: PowerSignal,
}

#[derive(Debug, Serialize)]
struct CommandBody<'a> {
    command: &'a str,
}

#[derive(Debug, Deserialize)]
struct CredentialsEnvelope {
    data: ConsoleCredentials,
}

/// Client API client.
#[derive(Debug, Clone)]
pub struct ClientApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ClientApiClient {
    /// Create a new Client API client.
    pub fn new(credentials: &PanelCredentials) -> Result<Self, PanelError> {
        let (http, base_url) = build_client(credentials)?;
        Ok(Self { http, base_url })
    }

    /// Build the Client API URL for a server-scoped path.
    pub(crate) fn server_url(&self, identifier: &str, path: &str) -> String {
        format!("{}/api/client/servers/{identifier}{path}", self.base_url)
    }

    /// Send a power signal to a server.
    pub async fn send_power_action(
        &self,
        identifier: &str,
        signal: PowerSignal,
    ) -> Result<(), PanelError> {
        let url = self.server_url(identifier, "/power");
        let resp = self
            .http
            .post(&url)
            .json(&PowerBody { signal })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    /// Dispatch a raw console command to a server.
    pub async fn send_command(&self, identifier: &str, command: &str) -> Result<(), PanelError> {
        let url = self.server_url(identifier, "/command");
        let resp = self
            .http
            .post(&url)
            .json(&CommandBody { command })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    /// Write a file into the server's container filesystem. The target
    /// path rides in the query string; the body is the raw content.
    pub async fn write_file(
        &self,
        identifier: &str,
        file: &str,
        content: &str,
    ) -> Result<(), PanelError> {
        let url = format!(
            "{}?file={}",
            self.server_url(identifier, "/files/write"),
            urlencode(file)
        );
        let resp = self
            .http
            .post(&url)
            .body(content.to_string())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        Ok(())
    }

    /// Obtain ephemeral console credentials (socket URL + bearer token)
    /// for a server. Issued per server, per session; callers must
    /// re-fetch on every reconnect rather than reuse a stale token.
    pub async fn console_credentials(
        &self,
        identifier: &str,
    ) -> Result<ConsoleCredentials, PanelError> {
        let url = self.server_url(identifier, "/websocket");
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }
        let envelope: CredentialsEnvelope = resp.json().await?;
        Ok(envelope.data)
    }
}
