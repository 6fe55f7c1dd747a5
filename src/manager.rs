use std::fmt;
use std::sync::Arc;

use crate::SessionError;
use crate::config::{CookieOptions, SessionConfig};
use crate::crypto::id_prefix;
use crate::http::{RequestCookies, ResponseCookies, SessionCookie};
use crate::registry::ProviderRegistry;
use crate::session::{Session, SessionProvider};

/// Per-request entry point to sessions.
///
/// Owns the cookie that carries the session identifier and delegates storage
/// to one provider from a [`ProviderRegistry`]. Build it once at startup and
/// share it between handlers.
pub struct SessionManager {
    provider: Arc<dyn SessionProvider>,
    provider_name: String,
    cookie_name: String,
    lifetime_secs: u64,
    cookie_options: CookieOptions,
}

impl SessionManager {
    /// Creates a manager using default cookie attributes.
    ///
    /// Negative lifetimes clamp to zero, which disables expiry.
    ///
    /// # Errors
    ///
    /// - `SessionError::ProviderNotFound` if `provider_name` is not registered
    /// - `SessionError::ConfigurationError` if `cookie_name` is empty
    pub fn new(
        registry: &ProviderRegistry,
        provider_name: &str,
        cookie_name: impl Into<String>,
        lifetime_secs: i64,
    ) -> Result<Self, SessionError> {
        Self::build(
            registry,
            provider_name,
            cookie_name.into(),
            u64::try_from(lifetime_secs).unwrap_or(0),
            CookieOptions::default(),
        )
    }

    /// Creates a manager from a validated [`SessionConfig`].
    ///
    /// Only the manager-level settings are taken from `config`: provider name,
    /// cookie name, lifetime and cookie attributes. Decode policy, signing key
    /// and sweep period live on the providers, so `registry` should come from
    /// [`ProviderRegistry::from_config`] with the same config. Use
    /// [`with_builtin`](Self::with_builtin) to get both in one step.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or `SessionError::ProviderNotFound`.
    pub fn from_config(
        registry: &ProviderRegistry,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Self::build(
            registry,
            &config.provider,
            config.cookie_name.clone(),
            config.lifetime(),
            config.cookie.clone(),
        )
    }

    /// Creates a manager over the built-in providers, all configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns the validation error, or `SessionError::ProviderNotFound` if
    /// `config.provider` is neither `"memory"` nor `"cookie"`.
    pub fn with_builtin(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Self::from_config(&ProviderRegistry::from_config(config), config)
    }

    fn build(
        registry: &ProviderRegistry,
        provider_name: &str,
        cookie_name: String,
        lifetime_secs: u64,
        cookie_options: CookieOptions,
    ) -> Result<Self, SessionError> {
        if cookie_name.is_empty() {
            return Err(SessionError::ConfigurationError(
                "cookie_name must not be empty".to_owned(),
            ));
        }

        let provider = registry.get(provider_name).ok_or_else(|| {
            log::error!(target: "enclave_session::manager", "msg=\"unknown session provider\" provider=\"{provider_name}\"");
            SessionError::ProviderNotFound(provider_name.to_owned())
        })?;

        provider.initialize(lifetime_secs)?;
        provider.run_gc()?;

        log::info!(target: "enclave_session::manager", "msg=\"session manager ready\" provider=\"{provider_name}\" cookie=\"{cookie_name}\" lifetime_secs={lifetime_secs}");

        Ok(Self {
            provider,
            provider_name: provider_name.to_owned(),
            cookie_name,
            lifetime_secs,
            cookie_options,
        })
    }

    /// Returns the session for this request, starting a new one if the
    /// request carries no identifier cookie, or one the provider rejects as
    /// malformed.
    ///
    /// The identifier cookie is (re)written on every call, refreshing its expiry.
    /// With the cookie backend, call [`Session::finalize`] before the body is sent.
    ///
    /// # Errors
    ///
    /// - `SessionError::RandomnessFailure` if a new identifier cannot be generated
    /// - `SessionError::CorruptCookie` from the cookie backend in strict mode
    /// - `SessionError::LockPoisoned` from the memory backend
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "session_start", skip_all, fields(provider = %self.provider_name), err)
    )]
    pub fn start(
        &self,
        request: &dyn RequestCookies,
        response: &mut dyn ResponseCookies,
    ) -> Result<Box<dyn Session>, SessionError> {
        let session_id = match request.cookie(&self.cookie_name) {
            Some(id) if self.provider.is_valid_session_id(&id) => id,
            Some(id) if !id.is_empty() => {
                log::warn!(target: "enclave_session::manager", "msg=\"malformed session identifier replaced\" cookie=\"{}\" length={}", self.cookie_name, id.len());
                self.provider.new_session_id()?
            }
            _ => self.provider.new_session_id()?,
        };

        let session = self.provider.get_or_create(&session_id, request)?;

        response.set_cookie(SessionCookie::new(
            self.cookie_name.as_str(),
            session_id,
            &self.cookie_options,
            self.lifetime_secs,
        ));

        Ok(session)
    }

    /// Ends the session carried by this request and tells the client to drop
    /// the identifier cookie. A request without a session is left alone.
    ///
    /// # Errors
    ///
    /// Returns whatever the provider reports while destroying the session.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "session_destroy", skip_all, fields(provider = %self.provider_name), err)
    )]
    pub fn destroy(
        &self,
        request: &dyn RequestCookies,
        response: &mut dyn ResponseCookies,
    ) -> Result<(), SessionError> {
        let Some(session_id) = request.cookie(&self.cookie_name).filter(|id| !id.is_empty()) else {
            return Ok(());
        };

        // a malformed identifier never named a session; only the cookie goes
        if self.provider.is_valid_session_id(&session_id) {
            self.provider.destroy(&session_id, response)?;
        }
        response.set_cookie(SessionCookie::removal(
            self.cookie_name.as_str(),
            &self.cookie_options,
        ));

        log::info!(target: "enclave_session::manager", "msg=\"session destroyed\" session=\"{}\"", id_prefix(&session_id));
        Ok(())
    }

    /// Stops background work of the provider, such as the memory sweeper.
    pub fn shutdown(&self) {
        self.provider.shutdown();
    }

    pub fn provider(&self) -> &Arc<dyn SessionProvider> {
        &self.provider
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("provider", &self.provider_name)
            .field("cookie_name", &self.cookie_name)
            .field("lifetime_secs", &self.lifetime_secs)
            .field("cookie_options", &self.cookie_options)
            .finish()
    }
}
