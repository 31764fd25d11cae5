//! PIN set and PIN login. Both answer with a fresh bearer token.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

use super::{
    required,
    types::{ErrorResponse, PinRequest, SessionTokenResponse},
};
use crate::credentials::{CredentialError, CredentialManager, IssuedSession};

fn fields(payload: Option<Json<PinRequest>>) -> Result<(String, String), CredentialError> {
    let Some(Json(request)) = payload else {
        return Err(CredentialError::MissingField("studentPublicId"));
    };
    let public_id = required(request.student_public_id, "studentPublicId")?;
    // Blank PINs fall through to the format check.
    let pin = request.pin.ok_or(CredentialError::MissingField("pin"))?;
    Ok((public_id, pin))
}

fn issued_response(issued: &IssuedSession) -> axum::response::Response {
    let body = SessionTokenResponse {
        session_token: issued.token.expose_secret().to_string(),
        expires_at: issued.expires_at,
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/student-auth/set-pin",
    request_body = PinRequest,
    responses(
        (status = 200, description = "PIN stored and session opened", body = SessionTokenResponse),
        (status = 400, description = "Missing field, bad PIN format, or PIN already set", body = ErrorResponse),
        (status = 404, description = "No student with this public id", body = ErrorResponse)
    ),
    tag = "student-auth"
)]
#[instrument(skip(manager, payload))]
pub async fn set_pin(
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<PinRequest>>,
) -> impl IntoResponse {
    let result = match fields(payload) {
        Ok((public_id, pin)) => manager.set_pin(&public_id, &pin).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(issued) => issued_response(&issued),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/student-auth/login",
    request_body = PinRequest,
    responses(
        (status = 200, description = "PIN accepted and session opened", body = SessionTokenResponse),
        (status = 400, description = "Missing field, bad PIN format, PIN not set, or reset required", body = ErrorResponse),
        (status = 401, description = "Incorrect PIN", body = ErrorResponse),
        (status = 404, description = "No student with this public id", body = ErrorResponse)
    ),
    tag = "student-auth"
)]
#[instrument(skip(manager, payload))]
pub async fn login(
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<PinRequest>>,
) -> impl IntoResponse {
    let result = match fields(payload) {
        Ok((public_id, pin)) => manager.login(&public_id, &pin).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(issued) => issued_response(&issued),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(public_id: Option<&str>, pin: Option<&str>) -> Option<Json<PinRequest>> {
        Some(Json(PinRequest {
            student_public_id: public_id.map(str::to_string),
            pin: pin.map(str::to_string),
        }))
    }

    #[test]
    fn only_absent_pin_is_missing() {
        assert!(matches!(
            fields(request(Some("ABC123"), None)),
            Err(CredentialError::MissingField("pin"))
        ));
        assert!(matches!(
            fields(request(None, Some("314159"))),
            Err(CredentialError::MissingField("studentPublicId"))
        ));
        assert!(matches!(fields(None), Err(CredentialError::MissingField(_))));
        for blank in ["", "      "] {
            let parsed = fields(request(Some("ABC123"), Some(blank)));
            assert_eq!(
                parsed.ok().map(|(_, pin)| pin),
                Some(blank.to_string())
            );
        }
    }
}
