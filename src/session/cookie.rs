//! Client-side session storage.
//!
//! The whole session is serialized to JSON, base64url encoded and sent back
//! as a cookie named after the session identifier. Nothing is stored on the
//! server. Without a [`SigningKey`] the payload is neither encrypted nor
//! authenticated, so clients can read and rewrite it.

use std::sync::{RwLock, RwLockReadGuard};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;

use super::{Session, SessionProvider, SessionValue, SessionValues};
use crate::SessionError;
use crate::config::{CookieOptions, DecodePolicy, MAX_COOKIE_SIZE};
use crate::crypto::{SigningKey, id_prefix, sign_payload, verify_signed_payload};
use crate::http::{RequestCookies, ResponseCookies, SessionCookie};

/// Serializes session values into a cookie-safe string.
///
/// With a key the result is `{base64url json}.{hex hmac}`.
///
/// # Errors
///
/// Returns `SessionError::EncodingError` if serialization fails, or
/// `SessionError::ConfigurationError` if the signing key is unusable.
pub fn encode_values(
    values: &SessionValues,
    key: Option<&SigningKey>,
) -> Result<String, SessionError> {
    let json =
        serde_json::to_vec(values).map_err(|e| SessionError::EncodingError(e.to_string()))?;
    let payload = URL_SAFE.encode(json);

    match key {
        Some(key) => sign_payload(&payload, key),
        None => Ok(payload),
    }
}

/// Reverses [`encode_values`].
///
/// # Errors
///
/// Returns `SessionError::CorruptCookie` if the signature does not verify,
/// or the payload is not base64url-wrapped JSON object.
pub fn decode_values(
    cookie_value: &str,
    key: Option<&SigningKey>,
) -> Result<SessionValues, SessionError> {
    let payload = match key {
        Some(key) => verify_signed_payload(cookie_value, key)
            .ok_or_else(|| SessionError::CorruptCookie("signature mismatch".to_owned()))?,
        None => cookie_value,
    };

    let json = URL_SAFE
        .decode(payload)
        .map_err(|e| SessionError::CorruptCookie(format!("invalid base64: {e}")))?;

    serde_json::from_slice(&json)
        .map_err(|e| SessionError::CorruptCookie(format!("invalid payload: {e}")))
}

#[derive(Debug, Clone, Default)]
struct CookieSettings {
    lifetime_secs: u64,
    options: CookieOptions,
    decode_policy: DecodePolicy,
    signing_key: Option<SigningKey>,
}

/// Cookie-backed session provider.
///
/// # Example
///
/// ```rust
/// use enclave_session::{CookieProvider, DecodePolicy, SigningKey};
///
/// let provider = CookieProvider::new()
///     .with_decode_policy(DecodePolicy::Strict)
///     .with_signing_key(SigningKey::new("a-signing-key-of-at-least-32-bytes!"));
/// ```
#[derive(Debug, Default)]
pub struct CookieProvider {
    settings: RwLock<CookieSettings>,
}

impl CookieProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cookie_options(self, options: CookieOptions) -> Self {
        self.update(|settings| settings.options = options)
    }

    #[must_use]
    pub fn with_decode_policy(self, policy: DecodePolicy) -> Self {
        self.update(|settings| settings.decode_policy = policy)
    }

    /// Authenticates payloads with HMAC-SHA256. Unsigned or tampered cookies
    /// then count as corrupt.
    #[must_use]
    pub fn with_signing_key(self, key: SigningKey) -> Self {
        self.update(|settings| settings.signing_key = Some(key))
    }

    fn update(self, f: impl FnOnce(&mut CookieSettings)) -> Self {
        let mut settings = self
            .settings
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut settings);
        Self {
            settings: RwLock::new(settings),
        }
    }

    fn settings(&self) -> Result<RwLockReadGuard<'_, CookieSettings>, SessionError> {
        self.settings.read().map_err(|_| SessionError::LockPoisoned)
    }
}

impl SessionProvider for CookieProvider {
    fn initialize(&self, lifetime_secs: u64) -> Result<(), SessionError> {
        self.settings
            .write()
            .map_err(|_| SessionError::LockPoisoned)?
            .lifetime_secs = lifetime_secs;
        Ok(())
    }

    fn lifetime_secs(&self) -> Result<u64, SessionError> {
        Ok(self.settings()?.lifetime_secs)
    }

    fn get_or_create(
        &self,
        session_id: &str,
        request: &dyn RequestCookies,
    ) -> Result<Box<dyn Session>, SessionError> {
        let settings = self.settings()?.clone();

        let values = match request.cookie(session_id) {
            Some(raw) if !raw.is_empty() => {
                match decode_values(&raw, settings.signing_key.as_ref()) {
                    Ok(values) => values,
                    Err(e) if settings.decode_policy == DecodePolicy::Strict => {
                        log::warn!(target: "enclave_session::cookie", "msg=\"rejected session cookie\" session=\"{}\" error=\"{e}\"", id_prefix(session_id));
                        return Err(e);
                    }
                    Err(e) => {
                        log::warn!(target: "enclave_session::cookie", "msg=\"undecodable session cookie, starting empty\" session=\"{}\" error=\"{e}\"", id_prefix(session_id));
                        SessionValues::new()
                    }
                }
            }
            _ => SessionValues::new(),
        };

        Ok(Box::new(CookieSession {
            id: session_id.to_owned(),
            values,
            settings,
        }))
    }

    fn destroy(
        &self,
        session_id: &str,
        response: &mut dyn ResponseCookies,
    ) -> Result<(), SessionError> {
        let options = self.settings()?.options.clone();
        response.set_cookie(SessionCookie::removal(session_id, &options));
        Ok(())
    }

    fn run_gc(&self) -> Result<usize, SessionError> {
        Ok(0)
    }
}

/// Session decoded from, and written back to, the client's cookie.
pub struct CookieSession {
    id: String,
    values: SessionValues,
    settings: CookieSettings,
}

impl Session for CookieSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Option<SessionValue>, SessionError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), SessionError> {
        self.values.remove(key);
        Ok(())
    }

    fn finalize(&mut self, response: &mut dyn ResponseCookies) -> Result<(), SessionError> {
        let encoded = encode_values(&self.values, self.settings.signing_key.as_ref())?;
        if encoded.len() > MAX_COOKIE_SIZE {
            log::warn!(target: "enclave_session::cookie", "msg=\"session cookie exceeds browser limit\" session=\"{}\" bytes={}", id_prefix(&self.id), encoded.len());
        }

        response.set_cookie(SessionCookie::new(
            self.id.as_str(),
            encoded,
            &self.settings.options,
            self.settings.lifetime_secs,
        ));
        Ok(())
    }
}
