//! Uniform API error envelope.
//!
//! Every failure leaving this server is `{"error": "..."}` with an
//! appropriate status code; handlers convert domain errors through the
//! `From` impls below and never hand-build JSON errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use perch_core::policy::DenyReason;
use perch_panel::PanelError;

use crate::provision::ProvisionError;
use crate::storage::DatabaseError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// The panel connection is not configured.
    pub fn panel_unconfigured() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "Panel connection is not configured",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::not_found(format!("Not found: {what}")),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<PanelError> for ApiError {
    fn from(e: PanelError) -> Self {
        match e {
            PanelError::Api { status, ref message } => {
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                Self::new(code, message.clone())
            }
            PanelError::Http(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            PanelError::Config(message) => Self::internal(message),
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(e: ProvisionError) -> Self {
        match e {
            // Excluded nodes are a permission matter, not bad input.
            ProvisionError::Denied(DenyReason::NodeNotAllowed) => Self::forbidden(e.to_string()),
            ProvisionError::EggNotFound => Self::not_found(e.to_string()),
            ProvisionError::Denied(_) | ProvisionError::NoFreeAllocation => {
                Self::bad_request(e.to_string())
            }
            ProvisionError::Panel(panel) => panel.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_denials_map_to_distinct_statuses() {
        let forbidden: ApiError =
            ProvisionError::Denied(DenyReason::NodeNotAllowed).into();
        assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

        let missing: ApiError = ProvisionError::EggNotFound.into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let quota: ApiError =
            ProvisionError::Denied(DenyReason::QuotaExceeded { limit: 2 }).into();
        assert_eq!(quota.status, StatusCode::BAD_REQUEST);

        let full: ApiError = ProvisionError::NoFreeAllocation.into();
        assert_eq!(full.status, StatusCode::BAD_REQUEST);
    }
}
