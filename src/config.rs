//! Configuration types for session management.
//!
//! # Example
//!
//! ```rust
//! use enclave_session::{DecodePolicy, SessionConfig, SigningKey};
//!
//! // Use defaults
//! let config = SessionConfig::default();
//! assert_eq!(config.provider, "memory");
//!
//! // Or customize
//! let config = SessionConfig {
//!     provider: "cookie".to_owned(),
//!     decode_policy: DecodePolicy::Strict,
//!     signing_key: Some(SigningKey::new("a-signing-key-of-at-least-32-bytes!")),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use serde::Deserialize;

use crate::SessionError;
use crate::crypto::{MIN_SIGNING_KEY_LENGTH, SigningKey};

/// Browser limit most user agents apply to a single cookie.
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Default period of the in-memory sweeper.
pub const DEFAULT_GC_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    None,
    #[default]
    Lax,
    Strict,
}

/// What the cookie backend does with a cookie it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Start an empty session and log a warning.
    #[default]
    Lenient,
    /// Reject the request with [`SessionError::CorruptCookie`].
    Strict,
}

/// Attributes applied to every cookie the crate writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_owned(),
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

/// Session manager configuration.
///
/// Every field has a default, so partial documents deserialize cleanly:
///
/// ```rust
/// use enclave_session::SessionConfig;
///
/// let config: SessionConfig =
///     serde_json::from_str(r#"{ "provider": "cookie", "lifetime_secs": 60 }"#).unwrap();
/// assert_eq!(config.cookie_name, "enclave_session");
/// assert_eq!(config.lifetime_secs, 60);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Registry name of the backend.
    pub provider: String,

    /// Name of the cookie carrying the session identifier.
    pub cookie_name: String,

    /// Idle lifetime in seconds. Negative values clamp to zero; zero never expires.
    pub lifetime_secs: i64,

    pub cookie: CookieOptions,

    pub decode_policy: DecodePolicy,

    /// Authenticates cookie-backend payloads when set.
    pub signing_key: Option<SigningKey>,

    /// Period of the in-memory sweeper, in seconds.
    pub gc_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_owned(),
            cookie_name: "enclave_session".to_owned(),
            lifetime_secs: 7200,
            cookie: CookieOptions::default(),
            decode_policy: DecodePolicy::Lenient,
            signing_key: None,
            gc_interval_secs: DEFAULT_GC_INTERVAL_SECS,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration suitable for local development.
    ///
    /// Cookies are sent over plain HTTP and sessions idle out after 30 minutes.
    pub fn development() -> Self {
        Self {
            lifetime_secs: 1800,
            cookie: CookieOptions {
                secure: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Creates a configuration with stricter security settings.
    ///
    /// Corrupt cookies are rejected and cookies are not sent cross-site.
    pub fn strict() -> Self {
        Self {
            lifetime_secs: 1800,
            cookie: CookieOptions {
                same_site: SameSite::Strict,
                ..Default::default()
            },
            decode_policy: DecodePolicy::Strict,
            ..Default::default()
        }
    }

    /// Lifetime with negative values clamped to zero.
    pub fn lifetime(&self) -> u64 {
        u64::try_from(self.lifetime_secs).unwrap_or(0)
    }

    /// Checks the configuration for values no backend can work with.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigurationError` describing the first problem found.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.provider.is_empty() {
            return Err(SessionError::ConfigurationError(
                "provider must not be empty".to_owned(),
            ));
        }
        if self.cookie_name.is_empty() {
            return Err(SessionError::ConfigurationError(
                "cookie_name must not be empty".to_owned(),
            ));
        }
        if self.gc_interval_secs == 0 {
            return Err(SessionError::ConfigurationError(
                "gc_interval_secs must be greater than zero".to_owned(),
            ));
        }
        if let Some(key) = &self.signing_key {
            if key.len() < MIN_SIGNING_KEY_LENGTH {
                return Err(SessionError::ConfigurationError(format!(
                    "signing_key should be at least {MIN_SIGNING_KEY_LENGTH} bytes"
                )));
            }
        }
        Ok(())
    }
}
