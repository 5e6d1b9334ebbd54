//! Support tickets, user side.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::auth::SessionUser;
use crate::http::{ApiError, AppState};
use crate::storage::{Ticket, TicketMessage, TicketStatus};

/// GET /api/tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    Ok(Json(state.db.list_tickets_for_user(&user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub subject: String,
    pub content: String,
}

/// POST /api/tickets
pub async fn create_ticket(
    State(state): State<AppState>,
    user: SessionUser,
    Json(body): Json<CreateTicketBody>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = body.subject.trim();
    if subject.is_empty() || subject.chars().count() > 191 {
        return Err(ApiError::bad_request(
            "Subject must be between 1 and 191 characters",
        ));
    }
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    if state.db.active_ticket_for_user(&user.id).await?.is_some() {
        return Err(ApiError::conflict(
            "You already have an open ticket. Close it before opening another.",
        ));
    }

    let ticket = state
        .db
        .create_ticket(&user.id, subject, body.content.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

fn authorize(ticket: &Ticket, user: &SessionUser) -> Result<(), ApiError> {
    if ticket.user_id != user.id && !user.is_admin {
        return Err(ApiError::forbidden("Not your ticket"));
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

/// GET /api/tickets/{id}
pub async fn get_ticket(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
) -> Result<Json<TicketDetail>, ApiError> {
    let ticket = state.db.get_ticket(&id).await?;
    authorize(&ticket, &user)?;
    let messages = state.db.list_ticket_messages(&id).await?;
    Ok(Json(TicketDetail { ticket, messages }))
}

#[derive(Debug, Deserialize)]
pub struct PostMessageBody {
    pub content: String,
}

/// POST /api/tickets/{id}
pub async fn post_message(
    State(state): State<AppState>,
    user: SessionUser,
    Path(id): Path<String>,
    Json(body): Json<PostMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    let ticket = state.db.get_ticket(&id).await?;
    authorize(&ticket, &user)?;
    if ticket.status == TicketStatus::Closed {
        return Err(ApiError::bad_request("Ticket is closed"));
    }

    let message = state
        .db
        .post_ticket_message(&id, &user.id, body.content.trim(), user.is_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
