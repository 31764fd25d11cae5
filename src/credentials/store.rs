//! Storage seams for the credential subsystem.
//!
//! `IdentityStore` owns student, credential and session rows. `OwnershipChecker` answers
//! whether a privileged caller may manage a given student. Both are object safe so the
//! server can hold them as `Arc<dyn ...>` and tests can swap in the in-memory versions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Credential state reported by lookup.
#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinStatus {
    NotSet,
    Set,
    ResetRequired,
}

/// A student row with its credential columns.
#[derive(Clone, Debug)]
pub struct Identity {
    pub id: Uuid,
    pub public_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub grade: Option<String>,
    pub room_name: Option<String>,
    /// `salt:hash`, `None` before the first PIN and after a reset.
    pub credential: Option<String>,
    pub reset_required: bool,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Identity {
    #[must_use]
    pub fn pin_status(&self) -> PinStatus {
        if self.reset_required {
            PinStatus::ResetRequired
        } else if self.credential.as_deref().is_some_and(|c| !c.is_empty()) {
            PinStatus::Set
        } else {
            PinStatus::NotSet
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
}

/// Session row as persisted. Never carries the raw token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub identity_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a conditional credential write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialWrite {
    Applied,
    /// The credential state no longer allowed the write; nothing was written.
    Conflict,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve an already upper-cased public id, compared case-insensitively.
    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<Identity>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>>;

    /// Store `credential`, clear the reset flag, stamp the login time and insert `session`,
    /// all or nothing. Applies only while the identity has no credential or a pending reset.
    async fn update_credential(
        &self,
        id: Uuid,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite>;

    /// Stamp the login time and insert `session`, all or nothing. Applies only while the
    /// stored credential still equals `credential` and no reset is pending.
    async fn record_login(
        &self,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite>;

    async fn find_session_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>>;

    /// Clear the credential, raise the reset flag and delete every session of the identity,
    /// all or nothing. Returns the number of revoked sessions, `None` if the identity is missing.
    async fn reset_credential(&self, id: Uuid) -> Result<Option<u64>>;

    async fn rooms_for_identity(&self, id: Uuid) -> Result<Vec<Room>>;

    /// Remove sessions whose expiry is at or before `now`.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait OwnershipChecker: Send + Sync {
    /// Map the identity provider's opaque user id to an internal caller id.
    async fn resolve_caller(&self, external_user_id: &str) -> Result<Option<Uuid>>;

    /// Whether `caller` may administer the student `target`.
    async fn owns(&self, caller: Uuid, target: Uuid) -> Result<bool>;
}
