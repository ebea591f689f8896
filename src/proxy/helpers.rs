use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::PersonaError;

/// A failed proxy call, rendered as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: msg.into(),
    }
}

pub fn unauthorized(msg: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        message: msg.into(),
    }
}

pub fn bad_gateway(msg: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_GATEWAY,
        message: msg.into(),
    }
}

/// Maps a service error to a reply: local validation is the client's fault,
/// anything else is the upstream's.
pub fn upstream_error(err: PersonaError) -> ApiError {
    match err {
        PersonaError::InvalidInput(msg) => bad_request(msg),
        other => bad_gateway(other.to_string()),
    }
}

pub fn validate_auth(expected: Option<&str>, headers: &HeaderMap) -> ApiResult<()> {
    let Some(key) = expected else {
        return Ok(());
    };

    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| unauthorized("Missing authorization"))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| unauthorized("Invalid authorization header"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token == key => Ok(()),
        _ => Err(unauthorized("Invalid API key")),
    }
}

/// Decodes an optional JSON body; an empty body is `None`.
pub fn parse_body(body: &[u8]) -> ApiResult<Option<serde_json::Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| bad_request(format!("Invalid JSON body: {e}")))
}
