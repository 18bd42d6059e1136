//! Bearer token authentication.
//!
//! Every request must carry `Authorization: Bearer <API_TOKEN>`. A header
//! without the `Bearer ` prefix is compared as a raw token.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use fetchgate_logging::gate_warn;

use super::error_response::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

pub async fn require_bearer_token(
    State(expected_token): State<Arc<str>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let Some(header) = header else {
        return ApiError::unauthorized(
            "Missing authorization header. Use: Authorization: Bearer YOUR_TOKEN",
        )
        .into_response();
    };

    let provided = header.strip_prefix(BEARER_PREFIX).unwrap_or(header);
    if constant_time_eq(provided.as_bytes(), expected_token.as_bytes()) {
        next.run(request).await
    } else {
        gate_warn!("rejected request to {} with invalid token", request.uri().path());
        ApiError::unauthorized("Invalid authorization token").into_response()
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
