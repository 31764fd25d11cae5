//! Credential lifecycle: lookup, PIN set, PIN login, forced reset and session validation.
//!
//! A student moves between three persisted states:
//!
//! - `NO_CREDENTIAL`: no PIN hash stored. Only set-pin is accepted.
//! - `ACTIVE`: PIN hash stored, reset flag clear. Only login is accepted.
//! - `RESET_PENDING`: reset flag raised by a teacher, PIN hash cleared, all sessions gone.
//!   Only set-pin is accepted.
//!
//! Set-pin is the only way into `ACTIVE`; force-reset is the only way into `RESET_PENDING`.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    error::CredentialError,
    hasher,
    store::{CredentialWrite, Identity, IdentityStore, OwnershipChecker, PinStatus, SessionRecord},
    token,
    validator::{self, SessionProfile},
};

const PUBLIC_ID_FIELD: &str = "studentPublicId";

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub student_id: Uuid,
    pub full_name: String,
    pub room_name: Option<String>,
    pub pin_status: PinStatus,
}

/// Raw token handed to the caller once; it is not recoverable afterwards.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// Trim and upper-case a public id, then check its shape.
///
/// # Errors
/// `MissingField` when empty, `InvalidField` when it is not 3-32 of `[A-Z0-9-]`.
pub fn normalize_public_id(public_id: &str) -> Result<String, CredentialError> {
    let normalized = public_id.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(CredentialError::MissingField(PUBLIC_ID_FIELD));
    }
    if Regex::new(r"^[A-Z0-9-]{3,32}$").is_ok_and(|re| re.is_match(&normalized)) {
        Ok(normalized)
    } else {
        Err(CredentialError::InvalidField(PUBLIC_ID_FIELD))
    }
}

pub struct CredentialManager {
    store: Arc<dyn IdentityStore>,
    ownership: Arc<dyn OwnershipChecker>,
}

impl CredentialManager {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, ownership: Arc<dyn OwnershipChecker>) -> Self {
        Self { store, ownership }
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn IdentityStore> {
        Arc::clone(&self.store)
    }

    /// Report who a public id belongs to and which PIN flow applies. Requires no proof.
    ///
    /// # Errors
    /// `MissingField`/`InvalidField` for a bad id, `NotFound` when nobody matches.
    #[instrument(skip(self))]
    pub async fn lookup(&self, public_id: &str) -> Result<LookupResult, CredentialError> {
        let identity = self.find(public_id).await?;
        Ok(LookupResult {
            student_id: identity.id,
            full_name: identity.full_name.clone(),
            room_name: identity.room_name.clone(),
            pin_status: identity.pin_status(),
        })
    }

    /// Establish a PIN for a student without one (or with a pending reset) and open a session.
    ///
    /// # Errors
    /// `InvalidFormat` before any store access, `NotFound`, `AlreadySet` when an active PIN
    /// exists (including when a concurrent set-pin won the race), `Internal` on store failure.
    #[instrument(skip(self, pin))]
    pub async fn set_pin(
        &self,
        public_id: &str,
        pin: &str,
    ) -> Result<IssuedSession, CredentialError> {
        let public_id = normalize_public_id(public_id)?;
        if !hasher::valid_pin(pin) {
            return Err(CredentialError::InvalidFormat);
        }

        let identity = self.find(&public_id).await?;
        if identity.pin_status() == PinStatus::Set {
            return Err(CredentialError::AlreadySet);
        }

        let credential = derive(pin.to_string(), None).await?;
        let issued = token::issue(Utc::now())?;
        let session = SessionRecord {
            identity_id: identity.id,
            token_hash: issued.token_hash,
            expires_at: issued.expires_at,
        };

        match self
            .store
            .update_credential(identity.id, &credential.encode(), &session)
            .await?
        {
            CredentialWrite::Applied => {
                info!(student_id = %identity.id, "student PIN set");
                Ok(IssuedSession {
                    token: issued.token,
                    expires_at: issued.expires_at,
                })
            }
            CredentialWrite::Conflict => {
                warn!(student_id = %identity.id, "concurrent PIN set lost the race");
                Err(CredentialError::AlreadySet)
            }
        }
    }

    /// Verify a PIN for an active student and open an additional session.
    ///
    /// # Errors
    /// `InvalidFormat` before any store access, `NotFound`, `PinNotSet`, `ResetRequired`,
    /// `IncorrectPin`, `Internal` on store failure.
    #[instrument(skip(self, pin))]
    pub async fn login(
        &self,
        public_id: &str,
        pin: &str,
    ) -> Result<IssuedSession, CredentialError> {
        let public_id = normalize_public_id(public_id)?;
        if !hasher::valid_pin(pin) {
            return Err(CredentialError::InvalidFormat);
        }

        let identity = self.find(&public_id).await?;
        let stored = match identity.pin_status() {
            PinStatus::ResetRequired => return Err(CredentialError::ResetRequired),
            PinStatus::NotSet => return Err(CredentialError::PinNotSet),
            PinStatus::Set => identity
                .credential
                .clone()
                .ok_or_else(|| anyhow!("active student has no stored credential"))?,
        };

        if !verify(pin.to_string(), stored.clone()).await? {
            info!(student_id = %identity.id, "incorrect student PIN");
            return Err(CredentialError::IncorrectPin);
        }

        let issued = token::issue(Utc::now())?;
        let session = SessionRecord {
            identity_id: identity.id,
            token_hash: issued.token_hash,
            expires_at: issued.expires_at,
        };

        // A reset that landed after the credential was read makes this a conflict.
        match self.store.record_login(&stored, &session).await? {
            CredentialWrite::Applied => {
                info!(student_id = %identity.id, "student logged in");
                Ok(IssuedSession {
                    token: issued.token,
                    expires_at: issued.expires_at,
                })
            }
            CredentialWrite::Conflict => {
                warn!(student_id = %identity.id, "PIN reset during login");
                Err(CredentialError::ResetRequired)
            }
        }
    }

    /// Map an identity-provider user id to a privileged caller.
    ///
    /// # Errors
    /// `Unauthenticated` when the id is blank or unknown.
    #[instrument(skip(self))]
    pub async fn resolve_requester(&self, external_user_id: &str) -> Result<Uuid, CredentialError> {
        let external_user_id = external_user_id.trim();
        if external_user_id.is_empty() {
            return Err(CredentialError::Unauthenticated);
        }
        self.ownership
            .resolve_caller(external_user_id)
            .await?
            .ok_or(CredentialError::Unauthenticated)
    }

    /// Clear the target's PIN, require a new one and log out every device. Idempotent.
    ///
    /// # Errors
    /// `NotFound` for an unknown target, `Forbidden` when the requester does not own it.
    #[instrument(skip(self))]
    pub async fn force_reset(&self, requester: Uuid, target: Uuid) -> Result<(), CredentialError> {
        if self.store.find_by_id(target).await?.is_none() {
            return Err(CredentialError::NotFound);
        }
        if !self.ownership.owns(requester, target).await? {
            warn!(%requester, %target, "PIN reset refused: requester does not own student");
            return Err(CredentialError::Forbidden);
        }

        let revoked = self
            .store
            .reset_credential(target)
            .await?
            .ok_or(CredentialError::NotFound)?;

        info!(%requester, %target, revoked, "student PIN reset");
        Ok(())
    }

    /// See [`validator::validate`].
    ///
    /// # Errors
    /// `InvalidSession`, `SessionExpired` or `Internal`.
    pub async fn validate_session(&self, token: &str) -> Result<SessionProfile, CredentialError> {
        validator::validate(self.store.as_ref(), token, Utc::now()).await
    }

    async fn find(&self, public_id: &str) -> Result<Identity, CredentialError> {
        let public_id = normalize_public_id(public_id)?;
        self.store
            .find_by_public_id(&public_id)
            .await?
            .ok_or(CredentialError::NotFound)
    }
}

// PBKDF2 is CPU bound; keep it off the async workers.
async fn derive(pin: String, salt: Option<String>) -> Result<hasher::PinHash, CredentialError> {
    let hash = tokio::task::spawn_blocking(move || hasher::hash_pin(&pin, salt.as_deref()))
        .await
        .context("PIN hashing task failed")??;
    Ok(hash)
}

async fn verify(pin: String, stored: String) -> Result<bool, CredentialError> {
    let matches = tokio::task::spawn_blocking(move || hasher::verify_pin(&pin, &stored))
        .await
        .context("PIN verification task failed")??;
    Ok(matches)
}
