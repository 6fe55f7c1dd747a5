//! Pluggable session management for HTTP services.
//!
//! A [`SessionManager`] wraps one [`SessionProvider`] resolved by name from a
//! [`ProviderRegistry`]. Two providers ship with the crate:
//!
//! - [`MemoryProvider`]: sessions live in process memory, expired by idle time
//!   with an LRU-ordered sweep.
//! - [`CookieProvider`]: the whole session is encoded into a cookie held by
//!   the client; nothing is kept server side.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! use enclave_session::{ProviderRegistry, SessionCookie, SessionManager};
//!
//! let registry = ProviderRegistry::with_builtin();
//! let manager = SessionManager::new(&registry, "memory", "sid", 3600).unwrap();
//!
//! let request: HashMap<String, String> = HashMap::new();
//! let mut response: Vec<SessionCookie> = Vec::new();
//!
//! let mut session = manager.start(&request, &mut response).unwrap();
//! session.set("user", "alice".into()).unwrap();
//! session.finalize(&mut response).unwrap();
//!
//! assert_eq!(response[0].name, "sid");
//! ```

pub mod config;
pub mod crypto;
pub mod http;
mod manager;
mod registry;
pub mod session;

use std::fmt;

pub use config::{CookieOptions, DecodePolicy, SameSite, SessionConfig};
pub use crypto::SigningKey;
pub use http::{RequestCookies, ResponseCookies, SessionCookie};
pub use manager::SessionManager;
pub use registry::ProviderRegistry;
pub use session::{
    CookieProvider, MemoryProvider, Session, SessionProvider, SessionValue, SessionValues,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The OS random source could not produce a full session identifier.
    RandomnessFailure,
    ProviderNotFound(String),
    DuplicateProvider(String),
    ConfigurationError(String),
    /// Only surfaced under [`DecodePolicy::Strict`].
    CorruptCookie(String),
    EncodingError(String),
    LockPoisoned,
}

impl std::error::Error for SessionError {}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::RandomnessFailure => {
                write!(f, "Could not read enough bytes from the system CSPRNG")
            }
            SessionError::ProviderNotFound(name) => {
                write!(f, "Unknown session provider \"{name}\"")
            }
            SessionError::DuplicateProvider(name) => {
                write!(f, "Session provider \"{name}\" is already registered")
            }
            SessionError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            SessionError::CorruptCookie(msg) => write!(f, "Corrupt session cookie: {msg}"),
            SessionError::EncodingError(msg) => write!(f, "Failed to encode session: {msg}"),
            SessionError::LockPoisoned => write!(f, "Session store lock poisoned"),
        }
    }
}
