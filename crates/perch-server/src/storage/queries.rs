//! User and settings queries.

use perch_core::db::{DatabaseError, unix_timestamp};

use super::db::Database;
use super::models::{SETTINGS_ID, Settings, User};

impl Database {
    // =========================================================================
    // User queries
    // =========================================================================

    /// Create a local user row linked to an existing panel account.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        panel_user_id: i64,
        panel_user_uuid: &str,
        is_admin: bool,
    ) -> Result<User, DatabaseError> {
        let now = unix_timestamp();

        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, panel_user_id, panel_user_uuid, is_admin, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(panel_user_id)
        .bind(panel_user_uuid)
        .bind(is_admin)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_user(id).await
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("User {id}")))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
            .fetch_all(self.pool())
            .await?;
        Ok(users)
    }

    pub async fn count_users(&self) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(count.0)
    }

    /// Update a user's own profile fields.
    pub async fn update_user_profile(
        &self,
        id: &str,
        username: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError> {
        sqlx::query("UPDATE users SET username = ?, avatar_url = ?, updated_at = ? WHERE id = ?")
            .bind(username)
            .bind(avatar_url)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        self.get_user(id).await
    }

    /// Reconcile the admin flag from the panel's `root_admin`.
    pub async fn set_user_admin(&self, id: &str, is_admin: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET is_admin = ?, updated_at = ? WHERE id = ?")
            .bind(is_admin)
            .bind(unix_timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Settings queries
    // =========================================================================

    /// Fetch the settings singleton, creating the default row on first read.
    pub async fn get_settings(&self) -> Result<Settings, DatabaseError> {
        let existing = sqlx::query_as::<_, Settings>("SELECT * FROM settings WHERE id = ?")
            .bind(SETTINGS_ID)
            .fetch_optional(self.pool())
            .await?;

        if let Some(settings) = existing {
            return Ok(settings);
        }

        sqlx::query("INSERT OR IGNORE INTO settings (id, updated_at) VALUES (?, ?)")
            .bind(SETTINGS_ID)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        sqlx::query_as::<_, Settings>("SELECT * FROM settings WHERE id = ?")
            .bind(SETTINGS_ID)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Settings singleton".into()))
    }

    /// Write the full settings row back (upsert).
    pub async fn save_settings(&self, settings: &Settings) -> Result<Settings, DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO settings (id, updated_at) VALUES (?, ?)")
            .bind(SETTINGS_ID)
            .bind(unix_timestamp())
            .execute(self.pool())
            .await?;

        sqlx::query(
            "UPDATE settings SET site_title = ?, site_description = ?, favicon_url = ?, \
             dashboard_greeting = ?, announcement_text = ?, show_announcement = ?, \
             captcha_enabled = ?, captcha_site_key = ?, captcha_secret_key = ?, \
             free_server_memory = ?, free_server_disk = ?, free_server_cpu = ?, \
             server_limit = ?, allowed_nodes = ?, panel_client_key = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&settings.site_title)
        .bind(&settings.site_description)
        .bind(&settings.favicon_url)
        .bind(&settings.dashboard_greeting)
        .bind(&settings.announcement_text)
        .bind(settings.show_announcement)
        .bind(settings.captcha_enabled)
        .bind(&settings.captcha_site_key)
        .bind(&settings.captcha_secret_key)
        .bind(settings.free_server_memory)
        .bind(settings.free_server_disk)
        .bind(settings.free_server_cpu)
        .bind(settings.server_limit)
        .bind(&settings.allowed_nodes)
        .bind(&settings.panel_client_key)
        .bind(unix_timestamp())
        .bind(SETTINGS_ID)
        .execute(self.pool())
        .await?;

        self.get_settings().await
    }
}
