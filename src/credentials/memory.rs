//! In-process store and ownership checker.
//!
//! Every trait method takes a single lock, which gives the same all-or-nothing behavior the
//! Postgres store gets from transactions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{
    CredentialWrite, Identity, IdentityStore, OwnershipChecker, Room, SessionRecord,
};

#[derive(Default)]
struct State {
    identities: HashMap<Uuid, Identity>,
    rooms: HashMap<Uuid, Vec<Room>>,
    sessions: HashMap<String, SessionRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a student with no credential.
    pub async fn add_student(&self, public_id: &str, full_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let identity = Identity {
            id,
            public_id: public_id.to_string(),
            full_name: full_name.to_string(),
            email: None,
            grade: None,
            room_name: None,
            credential: None,
            reset_required: false,
            last_login_at: None,
        };
        self.state.write().await.identities.insert(id, identity);
        id
    }

    /// Enroll a student in a new room. The first room by name is reported by lookup.
    pub async fn add_room(&self, student_id: Uuid, name: &str) -> Uuid {
        let room = Room {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        let room_id = room.id;
        let mut state = self.state.write().await;
        let rooms = state.rooms.entry(student_id).or_default();
        rooms.push(room);
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        let first = rooms.first().map(|room| room.name.clone());
        if let Some(identity) = state.identities.get_mut(&student_id) {
            identity.room_name = first;
        }
        room_id
    }

    /// Insert a session row directly, bypassing the login flow.
    pub async fn put_session(&self, session: SessionRecord) {
        self.state
            .write()
            .await
            .sessions
            .insert(session.token_hash.clone(), session);
    }

    /// Every persisted session row.
    pub async fn sessions(&self) -> Vec<SessionRecord> {
        self.state.read().await.sessions.values().cloned().collect()
    }

    pub async fn identity(&self, id: Uuid) -> Option<Identity> {
        self.state.read().await.identities.get(&id).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<Identity>> {
        let state = self.state.read().await;
        Ok(state
            .identities
            .values()
            .find(|identity| identity.public_id.to_uppercase() == public_id)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }

    async fn update_credential(
        &self,
        id: Uuid,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite> {
        let mut state = self.state.write().await;
        let Some(identity) = state.identities.get_mut(&id) else {
            return Ok(CredentialWrite::Conflict);
        };
        let has_active = identity.credential.as_deref().is_some_and(|c| !c.is_empty());
        if has_active && !identity.reset_required {
            return Ok(CredentialWrite::Conflict);
        }
        identity.credential = Some(credential.to_string());
        identity.reset_required = false;
        identity.last_login_at = Some(Utc::now());
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(CredentialWrite::Applied)
    }

    async fn record_login(
        &self,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite> {
        let mut state = self.state.write().await;
        let Some(identity) = state.identities.get_mut(&session.identity_id) else {
            return Ok(CredentialWrite::Conflict);
        };
        if identity.reset_required || identity.credential.as_deref() != Some(credential) {
            return Ok(CredentialWrite::Conflict);
        }
        identity.last_login_at = Some(Utc::now());
        state
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(CredentialWrite::Applied)
    }

    async fn find_session_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        Ok(self.state.read().await.sessions.get(token_hash).cloned())
    }

    async fn reset_credential(&self, id: Uuid) -> Result<Option<u64>> {
        let mut state = self.state.write().await;
        let Some(identity) = state.identities.get_mut(&id) else {
            return Ok(None);
        };
        identity.credential = None;
        identity.reset_required = true;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.identity_id != id);
        Ok(Some(
            u64::try_from(before - state.sessions.len()).unwrap_or(u64::MAX),
        ))
    }

    async fn rooms_for_identity(&self, id: Uuid) -> Result<Vec<Room>> {
        Ok(self
            .state
            .read()
            .await
            .rooms
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.sessions.len();
        state.sessions.retain(|_, session| session.expires_at > now);
        Ok(u64::try_from(before - state.sessions.len()).unwrap_or(u64::MAX))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Grants {
    callers: HashMap<String, Uuid>,
    owned: HashSet<(Uuid, Uuid)>,
}

/// Ownership checker backed by explicit grants.
#[derive(Default)]
pub struct MemoryOwnership {
    grants: RwLock<Grants>,
}

impl MemoryOwnership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a privileged caller under its external user id.
    pub async fn add_caller(&self, external_user_id: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.grants
            .write()
            .await
            .callers
            .insert(external_user_id.to_string(), id);
        id
    }

    pub async fn grant(&self, caller: Uuid, target: Uuid) {
        self.grants.write().await.owned.insert((caller, target));
    }
}

#[async_trait]
impl OwnershipChecker for MemoryOwnership {
    async fn resolve_caller(&self, external_user_id: &str) -> Result<Option<Uuid>> {
        Ok(self
            .grants
            .read()
            .await
            .callers
            .get(external_user_id)
            .copied())
    }

    async fn owns(&self, caller: Uuid, target: Uuid) -> Result<bool> {
        Ok(self.grants.read().await.owned.contains(&(caller, target)))
    }
}
