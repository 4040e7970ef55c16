use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-scoped error taxonomy. Nothing here is fatal to the process;
/// every variant renders as a structured JSON body at the boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("permission denied")]
    PermissionDenied,
    #[error("{0}")]
    Unauthenticated(String),
    #[error(transparent)]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// A unique-constraint violation is a client-visible conflict, not a server
/// fault: check-then-insert sequences can lose a race the constraint wins.
impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Self::validation("conflict", "duplicate value")
            }
            _ => Self::Internal(e),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        Self::from(anyhow::Error::new(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "field": field, "message": message }),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "message": format!("{what} not found") }),
            ),
            ApiError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                json!({ "message": "permission denied" }),
            ),
            ApiError::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, json!({ "message": message }))
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_renders_400() {
        let resp = ApiError::validation("username", "bad format").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_renders_404() {
        let resp = ApiError::NotFound("user").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn permission_denied_renders_403() {
        let resp = ApiError::PermissionDenied.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unauthenticated_renders_401() {
        let resp = ApiError::Unauthenticated("missing token".into()).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn plain_internal_errors_render_500() {
        let resp = ApiError::from(anyhow::anyhow!("boom")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
