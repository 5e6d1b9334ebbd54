//! Perch Dashboard Server
//!
//! HTTP API for a free-tier game-server dashboard backed by a
//! Pterodactyl-compatible panel.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use perch_core::tracing_init::init_tracing;
use perch_panel::application::ApplicationClient;
use perch_panel::client_api::ClientApiClient;
use perch_panel::PanelCredentials;

use perch_server::auth::SessionManager;
use perch_server::captcha::TurnstileVerifier;
use perch_server::console::ConsoleManager;
use perch_server::provision::NodeLocks;
use perch_server::settings::SettingsService;
use perch_server::storage::Database;
use perch_server::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "perch-server")]
#[command(version, about = "Perch dashboard server - free-tier game server hosting")]
struct Args {
    /// Address to listen on.
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Path to JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session signing secret.
    #[arg(long, env = "PERCH_SESSION_SECRET")]
    session_secret: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = perch_core::config::load_config(args.config.as_deref())?;
    if let Some(secret) = args.session_secret {
        config.session.secret = secret;
    }

    init_tracing(&format!("perch_server={}", config.http.log_level), args.log_json);

    let addr: SocketAddr = match args.addr {
        Some(addr) => addr,
        None => config.http.bind_addr.parse()?,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        "Starting perch-server"
    );

    let db_path = args
        .db_path
        .or_else(|| config.database_path.clone())
        .map_or_else(default_db_path, Ok)?;
    info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).await?;

    let sessions = Arc::new(SessionManager::new(
        config.session.secret.as_bytes(),
        config.session.ttl_secs,
    ));
    let settings = Arc::new(SettingsService::new(db.clone()));

    let (panel, client_api, consoles) = if config.panel.is_configured() {
        let app_credentials =
            PanelCredentials::new(&config.panel.base_url, &config.panel.application_key);
        let client_credentials =
            PanelCredentials::new(&config.panel.base_url, &config.panel.client_key);
        let panel = Arc::new(ApplicationClient::new(&app_credentials)?);
        let client_api = Arc::new(ClientApiClient::new(&client_credentials)?);
        let consoles = Arc::new(ConsoleManager::new(Arc::clone(&client_api)));
        info!(base_url = %config.panel.base_url, "Panel connection configured");
        (Some(panel), Some(client_api), Some(consoles))
    } else {
        warn!("Panel connection not configured; server routes will answer 503");
        (None, None, None)
    };

    let state = AppState {
        db,
        sessions,
        settings,
        panel,
        client_api,
        consoles,
        node_locks: Arc::new(NodeLocks::new()),
        captcha: Arc::new(TurnstileVerifier::new()?),
    };

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    tokio::select! {
        result = axum::serve(listener, router) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server stopped");
    Ok(())
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".perch").join("perch.db"))
}
