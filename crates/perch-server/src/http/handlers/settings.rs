//! Public site settings.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::http::{ApiError, AppState};
use crate::storage::Settings;

/// The subset of settings safe to hand to anonymous visitors. The
/// CAPTCHA secret and panel keys never leave the server.
#[derive(Debug, Serialize)]
pub struct PublicSettings {
    pub site_title: String,
    pub site_description: String,
    pub favicon_url: String,
    pub dashboard_greeting: String,
    pub announcement_text: String,
    pub show_announcement: bool,
    pub captcha_enabled: bool,
    pub captcha_site_key: String,
    pub free_server_memory: i64,
    pub free_server_disk: i64,
    pub free_server_cpu: i64,
    pub server_limit: i64,
}

impl From<Settings> for PublicSettings {
    fn from(s: Settings) -> Self {
        Self {
            site_title: s.site_title,
            site_description: s.site_description,
            favicon_url: s.favicon_url,
            dashboard_greeting: s.dashboard_greeting,
            announcement_text: s.announcement_text,
            show_announcement: s.show_announcement,
            captcha_enabled: s.captcha_enabled,
            captcha_site_key: s.captcha_site_key,
            free_server_memory: s.free_server_memory,
            free_server_disk: s.free_server_disk,
            free_server_cpu: s.free_server_cpu,
            server_limit: s.server_limit,
        }
    }
}

/// GET /api/settings
pub async fn public_settings(
    State(state): State<AppState>,
) -> Result<Json<PublicSettings>, ApiError> {
    let settings = state.settings.current().await?;
    Ok(Json(settings.into()))
}
