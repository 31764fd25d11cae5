//! PIN hashing with PBKDF2-HMAC-SHA256.
//!
//! The stored credential is a single text value, `<salt_hex>:<hash_hex>`, so the salt
//! travels with the hash and needs no column of its own.

use anyhow::{anyhow, Context, Result};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Derived PIN hash plus the salt used to produce it, both hex encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinHash {
    pub salt: String,
    pub hash: String,
}

impl PinHash {
    /// Encode as the `salt:hash` text stored on the student row.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.salt, self.hash)
    }

    /// Parse a stored `salt:hash` value.
    ///
    /// # Errors
    /// Returns an error if the value is not two non-empty hex segments.
    pub fn parse(stored: &str) -> Result<Self> {
        let (salt, hash) = stored
            .split_once(':')
            .ok_or_else(|| anyhow!("stored credential is missing the salt separator"))?;
        if salt.is_empty() || hash.is_empty() {
            return Err(anyhow!("stored credential has an empty segment"));
        }
        hex::decode(hash).context("stored credential hash is not hex")?;
        Ok(Self {
            salt: salt.to_string(),
            hash: hash.to_string(),
        })
    }
}

/// Six ASCII digits, nothing else.
pub fn valid_pin(pin: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").is_ok_and(|re| re.is_match(pin))
}

/// Derive a hash for `pin`. A fresh random salt is generated when `salt` is `None`.
///
/// The caller validates the PIN format first.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn hash_pin(pin: &str, salt: Option<&str>) -> Result<PinHash> {
    let salt = match salt {
        Some(salt) => salt.to_string(),
        None => generate_salt()?,
    };
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt.as_bytes(), PBKDF2_ITERATIONS, &mut key);
    Ok(PinHash {
        salt,
        hash: hex::encode(key),
    })
}

/// Re-derive with the stored salt and compare in constant time.
///
/// # Errors
/// Returns an error if the stored value cannot be parsed.
pub fn verify_pin(pin: &str, stored: &str) -> Result<bool> {
    let expected = PinHash::parse(stored)?;
    let candidate = hash_pin(pin, Some(&expected.salt))?;
    Ok(bool::from(
        candidate.hash.as_bytes().ct_eq(expected.hash.as_bytes()),
    ))
}

fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate PIN salt")?;
    Ok(hex::encode(bytes))
}
