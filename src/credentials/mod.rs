//! Student credential and session subsystem.
//!
//! Students locate their record with a classroom-distributed public id, then either set a
//! six digit PIN (first time, or after a teacher reset) or log in with it. Both paths open
//! a 24 hour bearer session. Only hashes are stored: the PIN as PBKDF2 `salt:hash`, the
//! session token as SHA-256.

pub mod error;
pub mod hasher;
pub mod lifecycle;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod sweeper;
pub mod token;
pub mod validator;

pub use error::{CredentialError, ErrorKind};
pub use lifecycle::{CredentialManager, IssuedSession, LookupResult};
pub use store::{IdentityStore, OwnershipChecker, PinStatus};
pub use validator::SessionProfile;
