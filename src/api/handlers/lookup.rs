use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::{required, types::LookupRequest};
use crate::credentials::{CredentialManager, LookupResult};

#[utoipa::path(
    post,
    path = "/api/student-auth/lookup",
    request_body = LookupRequest,
    responses(
        (status = 200, description = "Student found", body = LookupResult),
        (status = 400, description = "Missing or malformed studentPublicId", body = super::types::ErrorResponse),
        (status = 404, description = "No student with this public id", body = super::types::ErrorResponse)
    ),
    tag = "student-auth"
)]
#[instrument(skip(manager, payload))]
pub async fn lookup(
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<LookupRequest>>,
) -> impl IntoResponse {
    let public_id = payload.and_then(|Json(request)| request.student_public_id);
    let result = match required(public_id, "studentPublicId") {
        Ok(public_id) => manager.lookup(&public_id).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(found) => (StatusCode::OK, Json(found)).into_response(),
        Err(err) => err.into_response(),
    }
}
