//! Session and provider abstractions plus the two built-in backends.

mod cookie;
mod memory;

use std::collections::BTreeMap;

pub use cookie::{CookieProvider, CookieSession, decode_values, encode_values};
pub use memory::{MemoryProvider, MemorySession};

use crate::SessionError;
use crate::crypto::{generate_session_id, is_valid_session_id};
use crate::http::{RequestCookies, ResponseCookies};

/// A value stored in a session.
///
/// Strings, integers, floats, booleans, null and nested arrays/objects.
/// Non-finite floats cannot be represented, which keeps cookie encoding total.
pub type SessionValue = serde_json::Value;

/// Key-value contents of one session.
pub type SessionValues = BTreeMap<String, SessionValue>;

/// Handle on one client's session, as returned by a [`SessionProvider`].
pub trait Session: Send {
    /// The session identifier.
    fn id(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<SessionValue>, SessionError>;

    fn set(&mut self, key: &str, value: SessionValue) -> Result<(), SessionError>;

    fn delete(&mut self, key: &str) -> Result<(), SessionError>;

    /// Persists the session where the backend needs an explicit write.
    ///
    /// The cookie backend writes its payload cookie here, so this must run
    /// before any of the response body is sent. The memory backend has
    /// nothing to do.
    fn finalize(&mut self, response: &mut dyn ResponseCookies) -> Result<(), SessionError>;
}

/// Storage backend for sessions.
///
/// Implementations are shared across request handlers, so every method takes `&self`.
pub trait SessionProvider: Send + Sync {
    /// Sets the idle lifetime in seconds. Zero means sessions never expire.
    ///
    /// Safe to call repeatedly; the last call wins. Existing sessions are not re-stamped.
    fn initialize(&self, lifetime_secs: u64) -> Result<(), SessionError>;

    fn lifetime_secs(&self) -> Result<u64, SessionError>;

    /// Generates a fresh 64-character hex session identifier.
    fn new_session_id(&self) -> Result<String, SessionError> {
        generate_session_id()
    }

    /// Checks an identifier presented by a client before it is used.
    ///
    /// Override together with [`new_session_id`](Self::new_session_id) when
    /// identifiers take a different shape.
    fn is_valid_session_id(&self, session_id: &str) -> bool {
        is_valid_session_id(session_id)
    }

    /// Returns the session for `session_id`, creating an empty one if none exists.
    fn get_or_create(
        &self,
        session_id: &str,
        request: &dyn RequestCookies,
    ) -> Result<Box<dyn Session>, SessionError>;

    /// Destroys a session. Unknown identifiers are not an error.
    fn destroy(
        &self,
        session_id: &str,
        response: &mut dyn ResponseCookies,
    ) -> Result<(), SessionError>;

    /// Reclaims expired sessions and returns how many were removed.
    fn run_gc(&self) -> Result<usize, SessionError>;

    /// Stops any background work the provider started.
    fn shutdown(&self) {}
}
