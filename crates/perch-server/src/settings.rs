//! Settings access with a short-TTL read cache.
//!
//! Nearly every request consults settings (limits, node policy, branding),
//! so reads are served from a cached copy refreshed at most every
//! `ttl`. Admin updates write through the cache, making them visible
//! immediately in this process.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::storage::{Database, DatabaseError, Settings};

const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Admin settings patch; unset fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsUpdate {
    pub site_title: Option<String>,
    pub site_description: Option<String>,
    pub favicon_url: Option<String>,
    pub dashboard_greeting: Option<String>,
    pub announcement_text: Option<String>,
    pub show_announcement: Option<bool>,
    pub captcha_enabled: Option<bool>,
    pub captcha_site_key: Option<String>,
    pub captcha_secret_key: Option<String>,
    pub free_server_memory: Option<i64>,
    pub free_server_disk: Option<i64>,
    pub free_server_cpu: Option<i64>,
    pub server_limit: Option<i64>,
    pub allowed_nodes: Option<String>,
    pub panel_client_key: Option<String>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut Settings) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    settings.$field = value;
                })*
            };
        }
        merge!(
            site_title,
            site_description,
            favicon_url,
            dashboard_greeting,
            announcement_text,
            show_announcement,
            captcha_enabled,
            captcha_site_key,
            captcha_secret_key,
            free_server_memory,
            free_server_disk,
            free_server_cpu,
            server_limit,
            allowed_nodes,
            panel_client_key,
        );
    }
}

pub struct SettingsService {
    db: Database,
    ttl: Duration,
    cache: RwLock<Option<(Instant, Settings)>>,
}

impl SettingsService {
    pub fn new(db: Database) -> Self {
        Self::with_ttl(db, DEFAULT_TTL)
    }

    pub fn with_ttl(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Current settings, served from cache when fresh.
    pub async fn current(&self) -> Result<Settings, DatabaseError> {
        if let Some((fetched_at, settings)) = self.cache.read().await.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Ok(settings.clone());
        }

        let settings = self.db.get_settings().await?;
        *self.cache.write().await = Some((Instant::now(), settings.clone()));
        Ok(settings)
    }

    /// Apply an admin patch and write through the cache.
    pub async fn update(&self, patch: SettingsUpdate) -> Result<Settings, DatabaseError> {
        let mut settings = self.db.get_settings().await?;
        patch.apply(&mut settings);
        let saved = self.db.save_settings(&settings).await?;
        *self.cache.write().await = Some((Instant::now(), saved.clone()));
        Ok(saved)
    }
}
