//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::session_service::SessionError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::NotFound(format!("Session {} not found", id)),
            SessionError::AssetNotFound(id) => {
                ApiError::NotFound(format!("Asset {} not found", id))
            }
            SessionError::Busy(id) => {
                ApiError::Conflict(format!("Session {} is busy processing", id))
            }
            SessionError::Validation(msg) => ApiError::BadRequest(msg),
            SessionError::Io(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use refract_core::domain::session::SessionId;

    #[test]
    fn test_session_errors_map_to_status() {
        let id = SessionId::new();
        let cases = [
            (SessionError::NotFound(id), StatusCode::NOT_FOUND),
            (
                SessionError::AssetNotFound(id.as_uuid()),
                StatusCode::NOT_FOUND,
            ),
            (SessionError::Busy(id), StatusCode::CONFLICT),
            (
                SessionError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
