//! Row models for dashboard storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Numeric id of the linked panel account.
    pub panel_user_id: i64,
    pub panel_user_uuid: String,
    pub is_admin: bool,
    pub avatar_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Site-wide settings singleton. One row, id `"site-settings"`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    pub id: String,
    pub site_title: String,
    pub site_description: String,
    pub favicon_url: String,
    pub dashboard_greeting: String,
    pub announcement_text: String,
    pub show_announcement: bool,
    pub captcha_enabled: bool,
    pub captcha_site_key: String,
    pub captcha_secret_key: String,
    /// Free-tier resource limits handed to every provisioned server.
    pub free_server_memory: i64,
    pub free_server_disk: i64,
    pub free_server_cpu: i64,
    /// Maximum servers per user.
    pub server_limit: i64,
    /// Node policy encoding, e.g. `"1:50,2"` (see `perch_core::NodePolicy`).
    pub allowed_nodes: String,
    pub panel_client_key: String,
    pub updated_at: i64,
}

pub const SETTINGS_ID: &str = "site-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Open,
    Answered,
    Closed,
}

impl TicketStatus {
    /// OPEN and ANSWERED tickets count against the one-active-ticket rule.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: String,
    pub user_id: String,
    pub subject: String,
    pub status: TicketStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketMessage {
    pub id: String,
    pub ticket_id: String,
    pub user_id: String,
    pub content: String,
    pub is_admin: bool,
    pub created_at: i64,
}
