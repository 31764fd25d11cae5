//! Session token minting.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use sha2::{Digest, Sha256};

pub const SESSION_TTL_HOURS: i64 = 24;
const TOKEN_BYTES: usize = 32;

/// A freshly minted bearer token. Only `token_hash` is ever persisted.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: SecretString,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Mint a new token valid for 24 hours from `now`.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn issue(now: DateTime<Utc>) -> Result<IssuedToken> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    let token = hex::encode(bytes);
    let token_hash = hash_session_token(&token);
    Ok(IssuedToken {
        token: SecretString::from(token),
        token_hash,
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
    })
}

/// SHA-256 of the presented token, hex encoded. This is the session lookup key.
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn token_is_64_hex_chars_and_hash_differs() -> Result<()> {
        let issued = issue(Utc::now())?;
        let raw = issued.token.expose_secret();
        assert_eq!(raw.len(), TOKEN_BYTES * 2);
        assert!(raw.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(raw, issued.token_hash);
        assert_eq!(issued.token_hash, hash_session_token(raw));
        Ok(())
    }

    #[test]
    fn expiry_is_one_day_out() -> Result<()> {
        let now = Utc::now();
        let issued = issue(now)?;
        assert_eq!(issued.expires_at - now, Duration::hours(24));
        Ok(())
    }

    #[test]
    fn tokens_are_unique() -> Result<()> {
        let first = issue(Utc::now())?;
        let second = issue(Utc::now())?;
        assert_ne!(first.token.expose_secret(), second.token.expose_secret());
        assert_ne!(first.token_hash, second.token_hash);
        Ok(())
    }

    #[test]
    fn debug_output_redacts_token() -> Result<()> {
        let issued = issue(Utc::now())?;
        let rendered = format!("{issued:?}");
        assert!(!rendered.contains(issued.token.expose_secret()));
        Ok(())
    }

    #[test]
    fn hashing_a_hash_does_not_round_trip() {
        let hash = hash_session_token("token");
        assert_ne!(hash_session_token(&hash), hash);
    }
}
