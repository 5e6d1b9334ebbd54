//! Admin routes. All of them require the `AdminUser` extractor.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use perch_core::policy::{NodePolicy, UNLIMITED, node_usage};
use perch_panel::types::{Pagination, Server};

use crate::auth::AdminUser;
use crate::http::{ApiError, AppState};
use crate::settings::SettingsUpdate;
use crate::storage::{Settings, Ticket, TicketStatus, User};

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users = state.db.count_users().await?;

    let mut servers = 0u64;
    let mut nodes = 0usize;
    let mut total_memory = 0i64;
    let mut total_disk = 0i64;

    if let Some(panel) = state.panel.as_ref() {
        let (page, pagination) = panel.list_all_servers(1).await;
        servers = pagination.map_or(page.len() as u64, |p| p.total);

        let node_list = panel.list_nodes().await;
        nodes = node_list.len();
        for node in &node_list {
            total_memory += node.memory;
            total_disk += node.disk;
        }
    }

    Ok(Json(serde_json::json!({
        "users": users,
        "servers": servers,
        "nodes": nodes,
        "total_memory": total_memory,
        "total_disk": total_disk,
    })))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.db.list_users().await?))
}

/// DELETE /api/admin/users/{id}
///
/// The panel account is removed first; if that fails the local row (and
/// its tickets) stay untouched.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if admin.id == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let user = state.db.get_user(&id).await?;

    if let Ok(panel_user_id) = u64::try_from(user.panel_user_id) {
        state.panel()?.delete_user(panel_user_id).await?;
    }

    for ticket in state.db.list_tickets_for_user(&id).await? {
        state.db.delete_ticket(&ticket.id).await?;
    }
    state.db.delete_user(&id).await?;

    info!(user_id = %id, admin_id = %admin.id, "Deleted user");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct ServerPage {
    pub servers: Vec<Server>,
    pub pagination: Option<Pagination>,
}

/// GET /api/admin/servers
pub async fn list_servers(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<ServerPage>, ApiError> {
    let panel = state.panel()?;
    let (servers, pagination) = panel.list_all_servers(query.page).await;
    Ok(Json(ServerPage {
        servers,
        pagination,
    }))
}

/// DELETE /api/admin/servers/{id}
pub async fn delete_server(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.panel()?.delete_server(id, true).await?;
    info!(server_id = id, admin_id = %admin.id, "Force-deleted server");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// GET /api/admin/settings: the full row, secrets included.
pub async fn get_settings(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.settings.current().await?))
}

/// POST /api/admin/settings
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(patch): Json<SettingsUpdate>,
) -> Result<Json<Settings>, ApiError> {
    let saved = state.settings.update(patch).await?;
    info!(admin_id = %admin.id, "Updated site settings");
    Ok(Json(saved))
}

/// GET /api/admin/tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    Ok(Json(state.db.list_all_tickets().await?))
}

#[derive(Debug, Deserialize)]
pub struct TicketStatusBody {
    pub id: String,
    pub status: TicketStatus,
}

/// PATCH /api/admin/tickets
pub async fn set_ticket_status(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(body): Json<TicketStatusBody>,
) -> Result<Json<Ticket>, ApiError> {
    state.db.get_ticket(&body.id).await?;
    Ok(Json(state.db.set_ticket_status(&body.id, body.status).await?))
}

/// DELETE /api/admin/tickets/{id}
pub async fn delete_ticket(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.delete_ticket(&id).await? {
        return Err(ApiError::not_found("Ticket not found"));
    }
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Serialize)]
pub struct NodeCapacity {
    pub id: u64,
    pub name: String,
    /// Free-tier limit; `-1` when the node is excluded.
    pub limit: i64,
    pub usage: usize,
    pub allowed: bool,
}

/// GET /api/admin/nodes: the capacity view, recomputed per request.
pub async fn node_capacity(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<NodeCapacity>>, ApiError> {
    let panel = state.panel()?;
    let settings = state.settings.current().await?;
    let policy = NodePolicy::parse(&settings.allowed_nodes);

    let mut view = Vec::new();
    for node in panel.list_nodes().await {
        let allocations = panel.list_allocations(node.id).await;
        let usage = node_usage(&allocations);

        let (limit, allowed) = if policy.is_empty() {
            (i64::from(UNLIMITED), true)
        } else {
            match policy.limit_for(node.id) {
                Some(limit) => (i64::from(limit), true),
                None => (-1, false),
            }
        };

        view.push(NodeCapacity {
            id: node.id,
            name: node.name,
            limit,
            usage,
            allowed,
        });
    }

    Ok(Json(view))
}
