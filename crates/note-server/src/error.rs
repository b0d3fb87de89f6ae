//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use note_core::NoteError;
use serde_json::json;

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    Store(NoteError),
    /// Body rejected before it reached a backend
    InvalidRequest(String),
}

impl From<NoteError> for ApiError {
    fn from(e: NoteError) -> Self {
        ApiError::Store(e)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Store(e @ NoteError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found", e.to_string())
            }
            ApiError::Store(e @ NoteError::Unavailable(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "backend_unavailable",
                e.to_string(),
            ),
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!("{}", message);
        }

        let body = Json(json!({
            "error": message,
            "code": code
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(NoteError::NotFound("x".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let down = ApiError::from(NoteError::Unavailable("redis: refused".into())).into_response();
        assert_eq!(down.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad = ApiError::InvalidRequest("missing field `content`".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
