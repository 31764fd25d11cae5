//! HTTP handlers for the student credential endpoints and shared helpers.

pub mod health;
pub mod lookup;
pub mod pin;
pub mod reset;
pub mod session;
pub mod types;

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tracing::error;

use crate::credentials::{CredentialError, ErrorKind};
use types::ErrorResponse;

pub const LOOKUP_PATH: &str = "/api/student-auth/lookup";
pub const SET_PIN_PATH: &str = "/api/student-auth/set-pin";
pub const LOGIN_PATH: &str = "/api/student-auth/login";
pub const SESSION_PATH: &str = "/api/student-auth/session";
pub const RESET_PIN_PATH: &str = "/api/students/reset-pin";

#[must_use]
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::StateConflict => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CredentialError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            // Store errors carry SQL context only; PINs and tokens never reach them.
            error!("student auth request failed: {err:#}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status_for(self.kind()), Json(body)).into_response()
    }
}

/// Extract a non-empty `Authorization: Bearer <token>` value.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Required string field from an optional JSON body.
pub(crate) fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, CredentialError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(CredentialError::MissingField(field)),
    }
}
