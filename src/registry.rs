use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::SessionError;
use crate::config::SessionConfig;
use crate::session::{CookieProvider, MemoryProvider, SessionProvider};

/// Registry name of the in-memory backend.
pub const MEMORY_PROVIDER: &str = "memory";

/// Registry name of the cookie backend.
pub const COOKIE_PROVIDER: &str = "cookie";

/// Named session providers a [`SessionManager`](crate::SessionManager) can be built from.
///
/// Build one at startup, register custom backends, then hand it to the manager.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use enclave_session::{MemoryProvider, ProviderRegistry};
///
/// let mut registry = ProviderRegistry::with_builtin();
/// registry
///     .register("admin-memory", Arc::new(MemoryProvider::new()))
///     .unwrap();
///
/// assert_eq!(registry.names(), ["admin-memory", "cookie", "memory"]);
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SessionProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `"memory"` and `"cookie"` with default settings.
    pub fn with_builtin() -> Self {
        Self::builtin(MemoryProvider::new(), CookieProvider::new())
    }

    /// Creates a registry holding `"memory"` and `"cookie"` configured from `config`.
    pub fn from_config(config: &SessionConfig) -> Self {
        let memory = MemoryProvider::with_gc_interval(Duration::from_secs(config.gc_interval_secs));

        let mut cookie = CookieProvider::new()
            .with_cookie_options(config.cookie.clone())
            .with_decode_policy(config.decode_policy);
        if let Some(key) = &config.signing_key {
            cookie = cookie.with_signing_key(key.clone());
        }

        Self::builtin(memory, cookie)
    }

    fn builtin(memory: MemoryProvider, cookie: CookieProvider) -> Self {
        let mut providers: HashMap<String, Arc<dyn SessionProvider>> = HashMap::new();
        providers.insert(MEMORY_PROVIDER.to_owned(), Arc::new(memory));
        providers.insert(COOKIE_PROVIDER.to_owned(), Arc::new(cookie));
        Self { providers }
    }

    /// Makes `provider` available under `name`.
    ///
    /// # Errors
    ///
    /// - `SessionError::ConfigurationError` if `name` is empty
    /// - `SessionError::DuplicateProvider` if `name` is already taken
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn SessionProvider>,
    ) -> Result<&mut Self, SessionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SessionError::ConfigurationError(
                "provider name must not be empty".to_owned(),
            ));
        }
        if self.providers.contains_key(&name) {
            log::error!(target: "enclave_session::registry", "msg=\"provider registered twice\" provider=\"{name}\"");
            return Err(SessionError::DuplicateProvider(name));
        }

        log::debug!(target: "enclave_session::registry", "msg=\"provider registered\" provider=\"{name}\"");
        self.providers.insert(name, provider);
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SessionProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecodePolicy;
    use crate::crypto::SigningKey;

    #[test]
    fn test_builtin_providers() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(registry.names(), ["cookie", "memory"]);
        assert!(registry.get(MEMORY_PROVIDER).is_some());
        assert!(registry.get(COOKIE_PROVIDER).is_some());
        assert!(registry.get("redis").is_none());
    }

    #[test]
    fn test_register_custom_provider() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.is_empty());

        registry
            .register("primary", Arc::new(MemoryProvider::new()))
            .unwrap()
            .register("secondary", Arc::new(CookieProvider::new()))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("primary"));
        assert!(registry.contains("secondary"));
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut registry = ProviderRegistry::with_builtin();
        let result = registry.register(MEMORY_PROVIDER, Arc::new(MemoryProvider::new()));
        assert_eq!(
            result.err(),
            Some(SessionError::DuplicateProvider("memory".to_owned()))
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_empty_name_fails() {
        let mut registry = ProviderRegistry::new();
        let result = registry.register("", Arc::new(MemoryProvider::new()));
        assert!(matches!(result, Err(SessionError::ConfigurationError(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_config_applies_cookie_settings() {
        use std::collections::HashMap;

        let config = SessionConfig {
            decode_policy: DecodePolicy::Strict,
            signing_key: Some(SigningKey::new("this-is-a-very-long-secret-key-for-testing")),
            ..Default::default()
        };
        let registry = ProviderRegistry::from_config(&config);
        let cookie = registry.get(COOKIE_PROVIDER).unwrap();

        let request = HashMap::from([("sid".to_owned(), "unsigned".to_owned())]);
        assert!(matches!(
            cookie.get_or_create("sid", &request),
            Err(SessionError::CorruptCookie(_))
        ));
    }

    #[test]
    fn test_debug_lists_names() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(
            format!("{registry:?}"),
            "ProviderRegistry { providers: [\"cookie\", \"memory\"] }"
        );
    }
}
