//! Session token issuance and validation (HS256).

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use perch_core::db::unix_timestamp;

use super::claims::{Claims, SessionUser};
use crate::storage::User;

/// Issues and validates session tokens carried in the session cookie.
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a session token for the given user.
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = unix_timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            panel_user_id: user.panel_user_id,
            panel_user_uuid: user.panel_user_uuid.clone(),
            is_admin: user.is_admin,
            iat: now,
            exp: now + self.ttl_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Validate a token and return the caller identity.
    pub fn validate(&self, token: &str) -> Result<SessionUser, jsonwebtoken::errors::Error> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims.into())
    }
}
