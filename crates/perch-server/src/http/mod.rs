//! Local HTTP surface (axum).

mod error;
mod router;

pub mod handlers;

pub use error::ApiError;
pub use router::build_router;

use std::sync::Arc;

use perch_panel::application::ApplicationClient;
use perch_panel::client_api::ClientApiClient;

use crate::auth::SessionManager;
use crate::captcha::CaptchaVerifier;
use crate::console::ConsoleManager;
use crate::provision::NodeLocks;
use crate::settings::SettingsService;
use crate::storage::Database;

/// Shared state for all request handlers.
///
/// Panel clients are `None` when the panel connection is not configured;
/// routes that need them answer 503 instead of failing at startup, so a
/// fresh install can come up, be configured through the admin settings,
/// and restart into a linked state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: Arc<SessionManager>,
    pub settings: Arc<SettingsService>,
    pub panel: Option<Arc<ApplicationClient>>,
    pub client_api: Option<Arc<ClientApiClient>>,
    pub consoles: Option<Arc<ConsoleManager>>,
    pub node_locks: Arc<NodeLocks>,
    pub captcha: Arc<dyn CaptchaVerifier>,
}

impl AppState {
    pub fn panel(&self) -> Result<&Arc<ApplicationClient>, ApiError> {
        self.panel.as_ref().ok_or_else(ApiError::panel_unconfigured)
    }

    pub fn client_api(&self) -> Result<&Arc<ClientApiClient>, ApiError> {
        self.client_api
            .as_ref()
            .ok_or_else(ApiError::panel_unconfigured)
    }

    pub fn consoles(&self) -> Result<&Arc<ConsoleManager>, ApiError> {
        self.consoles
            .as_ref()
            .ok_or_else(ApiError::panel_unconfigured)
    }
}
