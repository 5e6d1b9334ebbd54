//! Session token claims and the typed identity handlers receive.

use serde::{Deserialize, Serialize};

use crate::storage::User;

/// JWT claims embedded in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (local user ID).
    pub sub: String,
    pub username: String,
    /// Linked panel account id; drives server-ownership lookups.
    pub panel_user_id: i64,
    pub panel_user_uuid: String,
    pub is_admin: bool,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// The authenticated caller, as seen by request handlers.
///
/// A dedicated value type rather than a loose JSON blob so handlers can
/// rely on the fields being present and typed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub panel_user_id: i64,
    pub panel_user_uuid: String,
    pub is_admin: bool,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            panel_user_id: claims.panel_user_id,
            panel_user_uuid: claims.panel_user_uuid,
            is_admin: claims.is_admin,
        }
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            panel_user_id: user.panel_user_id,
            panel_user_uuid: user.panel_user_uuid.clone(),
            is_admin: user.is_admin,
        }
    }
}
