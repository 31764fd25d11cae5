use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{
    required,
    types::{ErrorResponse, OkResponse, ResetPinQuery, ResetPinRequest},
};
use crate::credentials::{CredentialError, CredentialManager};

#[utoipa::path(
    post,
    path = "/api/students/reset-pin",
    params(ResetPinQuery),
    request_body = ResetPinRequest,
    responses(
        (status = 200, description = "PIN cleared and all sessions revoked", body = OkResponse),
        (status = 400, description = "Missing or malformed studentId", body = ErrorResponse),
        (status = 401, description = "Caller is not a known teacher or admin", body = ErrorResponse),
        (status = 403, description = "Caller does not own this student", body = ErrorResponse),
        (status = 404, description = "Student not found", body = ErrorResponse)
    ),
    tag = "students"
)]
#[instrument(skip_all)]
pub async fn reset_pin(
    Query(query): Query<ResetPinQuery>,
    manager: Extension<Arc<CredentialManager>>,
    payload: Option<Json<ResetPinRequest>>,
) -> impl IntoResponse {
    let Some(caller) = query.auth0_user_id else {
        return CredentialError::Unauthenticated.into_response();
    };

    let result = match manager.resolve_requester(&caller).await {
        Ok(requester) => {
            match parse_student_id(payload.and_then(|Json(request)| request.student_id)) {
                Ok(target) => manager.force_reset(requester, target).await,
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        Err(err) => err.into_response(),
    }
}

fn parse_student_id(value: Option<String>) -> Result<Uuid, CredentialError> {
    let value = required(value, "studentId")?;
    Uuid::parse_str(value.trim()).map_err(|_| CredentialError::InvalidField("studentId"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_student_id_distinguishes_missing_and_malformed() {
        assert!(matches!(
            parse_student_id(None),
            Err(CredentialError::MissingField("studentId"))
        ));
        assert!(matches!(
            parse_student_id(Some("not-a-uuid".to_string())),
            Err(CredentialError::InvalidField("studentId"))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_student_id(Some(id.to_string())).ok(), Some(id));
    }
}
