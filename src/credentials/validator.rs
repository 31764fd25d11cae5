//! Bearer token validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    error::CredentialError,
    store::{IdentityStore, Room},
    token::hash_session_token,
};

/// Public profile fields of the student that owns a session.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub student_public_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionProfile {
    pub student: StudentProfile,
    pub rooms: Vec<Room>,
}

/// Resolve a presented token to its student.
///
/// The row is looked up by exact hash. An unknown hash is `InvalidSession`; a known hash
/// with `now >= expires_at` is `SessionExpired` and the row is left in place.
///
/// # Errors
/// Returns the errors above, or `Internal` when the store fails.
pub async fn validate(
    store: &dyn IdentityStore,
    presented_token: &str,
    now: DateTime<Utc>,
) -> Result<SessionProfile, CredentialError> {
    let token_hash = hash_session_token(presented_token);
    let session = store
        .find_session_by_hash(&token_hash)
        .await?
        .ok_or(CredentialError::InvalidSession)?;

    if now >= session.expires_at {
        return Err(CredentialError::SessionExpired);
    }

    // A session whose student was removed is as good as unknown.
    let identity = store
        .find_by_id(session.identity_id)
        .await?
        .ok_or(CredentialError::InvalidSession)?;
    let rooms = store.rooms_for_identity(identity.id).await?;

    Ok(SessionProfile {
        student: StudentProfile {
            id: identity.id,
            name: identity.full_name,
            email: identity.email,
            grade: identity.grade,
            student_public_id: identity.public_id,
        },
        rooms,
    })
}
