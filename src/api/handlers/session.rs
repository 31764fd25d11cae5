use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use super::{extract_bearer_token, types::ErrorResponse};
use crate::credentials::{CredentialError, CredentialManager, SessionProfile};

#[utoipa::path(
    get,
    path = "/api/student-auth/session",
    responses(
        (status = 200, description = "Session is valid", body = SessionProfile),
        (status = 401, description = "Missing, unknown or expired bearer token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "student-auth"
)]
#[instrument(skip(headers, manager))]
pub async fn session(
    headers: HeaderMap,
    manager: Extension<Arc<CredentialManager>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return CredentialError::Unauthenticated.into_response();
    };

    match manager.validate_session(&token).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => err.into_response(),
    }
}
