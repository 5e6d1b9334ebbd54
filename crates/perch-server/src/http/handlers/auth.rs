//! Registration, login, and logout.
//!
//! Registration creates the panel account first and only then the local
//! row, so a local user always has a live panel link. The panel's
//! `root_admin` flag is the source of truth for admin status and is
//! reconciled at every login.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use serde::Deserialize;
use tracing::{info, warn};

use perch_panel::application::CreateUser;

use crate::auth::{
    SessionUser, clear_session_cookie, hash_password, session_cookie, verify_password,
};
use crate::http::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
    pub captcha_token: Option<String>,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=60).contains(&len) {
        return Err(ApiError::bad_request(
            "Username must be between 3 and 60 characters",
        ));
    }
    Ok(())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&body.username)?;
    if !body.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    if body.password.chars().count() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    if state.db.get_user_by_email(&body.email).await?.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }
    if state.db.get_user_by_username(&body.username).await?.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }

    // Panel account first; the local row only exists for linked accounts.
    let panel = state.panel()?;
    let panel_user = panel
        .create_user(&CreateUser {
            email: body.email.clone(),
            username: body.username.clone(),
            first_name: body.username.clone(),
            last_name: "User".into(),
            password: Some(body.password.clone()),
        })
        .await?;

    let password_hash =
        hash_password(&body.password).map_err(|e| ApiError::internal(e.to_string()))?;
    #[allow(clippy::cast_possible_wrap)]
    let user = state
        .db
        .create_user(
            &uuid::Uuid::new_v4().to_string(),
            &body.username,
            &body.email,
            &password_hash,
            panel_user.id as i64,
            &panel_user.uuid,
            panel_user.root_admin,
        )
        .await?;

    info!(user_id = %user.id, panel_user_id = user.panel_user_id, "Registered user");

    let session = SessionUser::from(&user);
    let token = state
        .sessions
        .issue(&user)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&token, state.sessions.ttl_secs()),
        )]),
        Json(session),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings.current().await?;
    if settings.captcha_enabled {
        let token = body
            .captcha_token
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("CAPTCHA token is required"))?;
        if !state
            .captcha
            .verify(&settings.captcha_secret_key, token)
            .await
        {
            return Err(ApiError::bad_request("CAPTCHA verification failed"));
        }
    }

    let Some(mut user) = state.db.get_user_by_email(&body.email).await? else {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    };

    let verified = verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !verified {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password",
        ));
    }

    // Reconcile the admin flag from the panel; a lookup failure just
    // leaves the local flag untouched.
    if let Some(panel) = state.panel.as_ref()
        && let Some(panel_user) = panel.get_user_by_email(&user.email).await
        && panel_user.root_admin != user.is_admin
    {
        warn!(
            user_id = %user.id,
            panel_admin = panel_user.root_admin,
            "Admin flag drifted from panel, reconciling"
        );
        state.db.set_user_admin(&user.id, panel_user.root_admin).await?;
        user.is_admin = panel_user.root_admin;
    }

    let session = SessionUser::from(&user);
    let token = state
        .sessions
        .issue(&user)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            session_cookie(&token, state.sessions.ttl_secs()),
        )]),
        Json(session),
    ))
}

/// POST /api/auth/logout
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        Json(serde_json::json!({ "ok": true })),
    )
}
