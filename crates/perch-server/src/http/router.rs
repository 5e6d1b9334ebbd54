//! Route table.

use axum::Router;
use axum::routing::{delete, get, post};

use super::AppState;
use super::handlers::{account, admin, auth, servers, settings, tickets};

/// Build the complete API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/settings", get(settings::public_settings))
        .route("/api/user", get(account::current_user))
        .route("/api/user/profile", post(account::update_profile))
        .route(
            "/api/servers",
            get(servers::list_servers).post(servers::create_server),
        )
        .route("/api/servers/{identifier}", delete(servers::delete_server))
        .route("/api/servers/{identifier}/power", post(servers::send_power))
        .route(
            "/api/servers/{identifier}/command",
            post(servers::send_command),
        )
        .route(
            "/api/servers/{identifier}/files/write",
            post(servers::write_file),
        )
        .route(
            "/api/servers/{identifier}/websocket",
            get(servers::websocket_credentials),
        )
        .route(
            "/api/servers/{identifier}/console",
            get(servers::console_snapshot),
        )
        .route(
            "/api/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route(
            "/api/tickets/{id}",
            get(tickets::get_ticket).post(tickets::post_message),
        )
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}", delete(admin::delete_user))
        .route("/api/admin/servers", get(admin::list_servers))
        .route("/api/admin/servers/{id}", delete(admin::delete_server))
        .route(
            "/api/admin/settings",
            get(admin::get_settings).post(admin::update_settings),
        )
        .route(
            "/api/admin/tickets",
            get(admin::list_tickets).patch(admin::set_ticket_status),
        )
        .route("/api/admin/tickets/{id}", delete(admin::delete_ticket))
        .route("/api/admin/nodes", get(admin::node_capacity))
        .with_state(state)
}
