//! Session identifiers and cookie payload signing.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer};
use sha2::Sha256;

use crate::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes drawn per session identifier (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Length of a hex-encoded session identifier.
pub const SESSION_ID_LENGTH: usize = SESSION_ID_BYTES * 2;

pub const MIN_SIGNING_KEY_LENGTH: usize = 32;

/// Generates a session identifier from the OS random source.
///
/// The identifier is 32 random bytes, hex encoded, so it is always
/// 64 characters and safe to place in URLs and cookie names.
///
/// # Errors
///
/// Returns `SessionError::RandomnessFailure` if the OS random source
/// cannot fill the buffer.
///
/// # Example
///
/// ```rust
/// use enclave_session::crypto::generate_session_id;
///
/// let id = generate_session_id().unwrap();
/// assert_eq!(id.len(), 64);
/// ```
pub fn generate_session_id() -> Result<String, SessionError> {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        log::error!(target: "enclave_session", "msg=\"random source failed\" error=\"{e}\"");
        SessionError::RandomnessFailure
    })?;
    Ok(hex::encode(bytes))
}

/// Returns true if `session_id` has the shape [`generate_session_id`] produces:
/// 64 lowercase hex characters.
pub fn is_valid_session_id(session_id: &str) -> bool {
    session_id.len() == SESSION_ID_LENGTH
        && session_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Shortened identifier for log lines.
pub(crate) fn id_prefix(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}

/// Key used to authenticate cookie payloads.
///
/// `Debug` and `Display` print `[REDACTED]` so the key never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(String);

impl SigningKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([REDACTED])")
    }
}

impl fmt::Display for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SigningKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SigningKey)
    }
}

fn keyed_mac(key: &SigningKey) -> Result<HmacSha256, SessionError> {
    HmacSha256::new_from_slice(key.expose_secret().as_bytes())
        .map_err(|e| SessionError::ConfigurationError(format!("invalid signing key: {e}")))
}

/// Appends an HMAC-SHA256 signature to a payload.
///
/// Produces `{payload}.{hex signature}`. The payload must not itself
/// contain `.`; base64url text never does.
pub fn sign_payload(payload: &str, key: &SigningKey) -> Result<String, SessionError> {
    let mut mac = keyed_mac(key)?;
    mac.update(payload.as_bytes());
    Ok(format!("{payload}.{}", hex::encode(mac.finalize().into_bytes())))
}

/// Verifies a signed value and returns the payload.
///
/// Returns `None` if the separator is missing or the signature does not match.
/// The comparison runs in constant time.
pub fn verify_signed_payload<'a>(signed: &'a str, key: &SigningKey) -> Option<&'a str> {
    let (payload, signature_hex) = signed.rsplit_once('.')?;
    let signature = hex::decode(signature_hex).ok()?;

    let mut mac = keyed_mac(key).ok()?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).ok().map(|()| payload)
}
