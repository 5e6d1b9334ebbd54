//! Game server routes: listing, provisioning, power, console.
//!
//! Servers live in the panel, never locally; ownership is re-derived per
//! request from the caller's live panel server list. Admins bypass the
//! ownership check.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;

use perch_console::BridgeState;
use perch_panel::types::{PowerSignal, Server};

use crate::auth::SessionUser;
use crate::http::{ApiError, AppState};
use crate::provision::{self, ProvisionRequest};

fn panel_owner_id(user: &SessionUser) -> Result<u64, ApiError> {
    u64::try_from(user.panel_user_id)
        .map_err(|_| ApiError::bad_request("No linked panel account"))
}

/// Resolve an identifier to a server the caller may act on.
async fn resolve_server(
    state: &AppState,
    user: &SessionUser,
    identifier: &str,
) -> Result<Server, ApiError> {
    let panel = state.panel()?;
    let owned = panel.list_servers_by_owner(panel_owner_id(user)?).await?;
    if let Some(server) = owned.into_iter().find(|s| s.identifier == identifier) {
        return Ok(server);
    }

    if user.is_admin {
        let mut page = 1;
        loop {
            let (servers, pagination) = panel.list_all_servers(page).await;
            if servers.is_empty() {
                break;
            }
            if let Some(server) = servers.into_iter().find(|s| s.identifier == identifier) {
                return Ok(server);
            }
            match pagination {
                Some(p) if p.current_page < p.total_pages => page += 1,
                _ => break,
            }
        }
    }

    Err(ApiError::not_found("Server not found"))
}

/// GET /api/servers
pub async fn list_servers(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<Server>>, ApiError> {
    let panel = state.panel()?;
    let servers = panel.list_servers_by_owner(panel_owner_id(&user)?).await?;
    Ok(Json(servers))
}

#[derive(Debug, Deserialize)]
pub struct CreateServerBody {
    pub name: String,
    pub node_id: u64,
    pub nest_id: u64,
    pub egg_id: u64,
}

/// POST /api/servers
pub async fn create_server(
    State(state): State<AppState>,
    user: SessionUser,
    Json(body): Json<CreateServerBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.name.trim();
    let len = name.chars().count();
    if !(1..=191).contains(&len) {
        return Err(ApiError::bad_request(
            "Server name must be between 1 and 191 characters",
        ));
    }

    let panel = state.panel()?;
    let settings = state.settings.current().await?;
    let request = ProvisionRequest {
        name: name.to_string(),
        node_id: body.node_id,
        nest_id: body.nest_id,
        egg_id: body.egg_id,
    };

    let server = provision::provision_server(
        panel.as_ref(),
        &state.node_locks,
        &settings,
        panel_owner_id(&user)?,
        &request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(server)))
}

/// DELETE /api/servers/{identifier}
pub async fn delete_server(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let server = resolve_server(&state, &user, &identifier).await?;
    state.panel()?.delete_server(server.id, true).await?;
    if let Some(consoles) = state.consoles.as_ref() {
        consoles.close(&identifier);
    }
    info!(server_id = server.id, identifier = %identifier, user_id = %user.id, "Deleted server");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct PowerBody {
    pub signal: PowerSignal,
}

/// POST /api/servers/{identifier}/power
pub async fn send_power(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
    Json(body): Json<PowerBody>,
) -> Result<StatusCode, ApiError> {
    resolve_server(&state, &user, &identifier).await?;
    state
        .client_api()?
        .send_power_action(&identifier, body.signal)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CommandBody {
    pub command: String,
}

/// POST /api/servers/{identifier}/command
pub async fn send_command(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
    Json(body): Json<CommandBody>,
) -> Result<StatusCode, ApiError> {
    if body.command.trim().is_empty() {
        return Err(ApiError::bad_request("Command must not be empty"));
    }
    resolve_server(&state, &user, &identifier).await?;
    state
        .client_api()?
        .send_command(&identifier, &body.command)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct WriteFileBody {
    pub path: String,
    pub content: String,
}

/// POST /api/servers/{identifier}/files/write
///
/// Used by the EULA acceptance flow to drop `eula=true` into `eula.txt`.
pub async fn write_file(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
    Json(body): Json<WriteFileBody>,
) -> Result<StatusCode, ApiError> {
    resolve_server(&state, &user, &identifier).await?;
    state
        .client_api()?
        .write_file(&identifier, &body.path, &body.content)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/servers/{identifier}/websocket
///
/// Hands the browser ephemeral console credentials after re-validating
/// ownership; the panel token embeds the permission set.
pub async fn websocket_credentials(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    resolve_server(&state, &user, &identifier).await?;
    let credentials = state.client_api()?.console_credentials(&identifier).await?;
    Ok(Json(serde_json::json!({
        "token": credentials.token,
        "socket": credentials.socket,
    })))
}

fn bridge_state_label(state: BridgeState) -> &'static str {
    match state {
        BridgeState::Connecting => "connecting",
        BridgeState::Authenticating => "authenticating",
        BridgeState::Connected => "connected",
        BridgeState::Reconnecting { .. } => "reconnecting",
        BridgeState::GaveUp => "gave_up",
        BridgeState::Closed => "closed",
    }
}

/// GET /api/servers/{identifier}/console
///
/// Server-side console snapshot: bridge state, last known power state,
/// and the buffered scrollback. Starts the bridge on first request.
pub async fn console_snapshot(
    State(state): State<AppState>,
    user: SessionUser,
    Path(identifier): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    resolve_server(&state, &user, &identifier).await?;
    let snapshot = state.consoles()?.snapshot(&identifier).await;
    Ok(Json(serde_json::json!({
        "state": bridge_state_label(snapshot.state),
        "power_state": snapshot.power_state,
        "lines": snapshot.lines,
    })))
}
