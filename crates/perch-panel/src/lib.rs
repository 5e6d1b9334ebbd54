//! Panel API integration.
//!
//! Provides reqwest-based clients for a Pterodactyl-compatible panel:
//! the Application API (admin key: users, servers, nodes, nests, eggs,
//! allocations) and the Client API (account key: power actions, command
//! dispatch, file writes, console credentials).

pub mod application;
pub mod client_api;
pub mod types;

#[cfg(test)]
mod tests;

pub use application::{ApplicationClient, CreateUser, UserUpdate};
pub use client_api::ClientApiClient;
pub use types::{
    Allocation, ConsoleCredentials, CreateServerRequest, Egg, EggVariable, FeatureLimits, Nest,
    Node, PanelUser, Pagination, PowerSignal, Server, ServerLimits,
};

use thiserror::Error;

/// Panel API client errors.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Panel API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for connecting to a panel instance.
#[derive(Debug, Clone)]
pub struct PanelCredentials {
    /// Panel base URL (e.g., "<https://panel.example.com>").
    pub base_url: String,
    /// API key for the credential class this client speaks.
    pub api_key: String,
}

impl PanelCredentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}
