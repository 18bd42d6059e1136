//! JSON error bodies for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fetchgate_engine::{ArticleError, TranscriptError};
use fetchgate_logging::gate_error;
use serde_json::json;

/// An error that renders as `{"success": false, "error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<ArticleError> for ApiError {
    fn from(err: ArticleError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            gate_error!("article extraction failed: {}", err);
            Self::internal(err.to_string())
        }
    }
}

impl From<TranscriptError> for ApiError {
    fn from(err: TranscriptError) -> Self {
        gate_error!("transcript retrieval failed: {}", err);
        Self::internal(err.to_string())
    }
}
