//! The caller's own account.

use axum::Json;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;

use crate::auth::{SessionUser, session_cookie};
use crate::http::{ApiError, AppState};

/// GET /api/user
pub async fn current_user(user: SessionUser) -> Json<SessionUser> {
    Json(user)
}

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
    pub username: String,
    pub avatar_url: Option<String>,
}

/// POST /api/user/profile
///
/// The session cookie embeds the username, so a successful update
/// re-issues it.
pub async fn update_profile(
    State(state): State<AppState>,
    user: SessionUser,
    Json(body): Json<ProfileBody>,
) -> Result<impl IntoResponse, ApiError> {
    let len = body.username.chars().count();
    if !(3..=60).contains(&len) {
        return Err(ApiError::bad_request(
            "Username must be between 3 and 60 characters",
        ));
    }

    if let Some(existing) = state.db.get_user_by_username(&body.username).await?
        && existing.id != user.id
    {
        return Err(ApiError::conflict("Username is already taken"));
    }

    let updated = state
        .db
        .update_user_profile(&user.id, &body.username, body.avatar_url.as_deref())
        .await?;

    let token = state
        .sessions
        .issue(&updated)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&token, state.sessions.ttl_secs()),
        )]),
        Json(SessionUser::from(&updated)),
    ))
}
