//! # BrightMinds student sign-in
//!
//! Students sign in to classroom devices with a public id handed out by their teacher and a
//! six digit PIN they choose themselves.
//!
//! ## Credentials
//!
//! - **Lookup:** a public id is normalized (trimmed, upper-cased) and resolves to a student
//!   record along with whether a PIN is set, unset, or awaiting a reset.
//! - **Set PIN:** allowed only while no PIN is stored or after a reset. Concurrent first-time
//!   sets are serialized by a compare-and-swap in the store; the loser sees `ALREADY_SET`.
//! - **Login:** verifies the PIN against its PBKDF2-SHA256 hash in constant time.
//!
//! Both set and login open a 24 hour bearer session. Only the SHA-256 of the token is stored.
//!
//! ## Teacher reset
//!
//! A teacher who owns the student (direct assignment or a shared grade) or an admin can force a
//! reset. The stored PIN is cleared and every session for the student is revoked.

pub mod api;
pub mod cli;
pub mod credentials;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
