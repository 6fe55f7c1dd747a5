//! The slice of HTTP this crate depends on: reading a named cookie from a
//! request and writing a cookie onto a response.
//!
//! Web frameworks plug in by implementing [`RequestCookies`] and
//! [`ResponseCookies`]. Adapters for axum and actix-web live behind the
//! `axum` and `actix` features. `HashMap<String, String>` and
//! `Vec<SessionCookie>` implement the traits too, which is handy in tests.

#[cfg(feature = "actix")]
mod actix;
#[cfg(feature = "axum")]
mod axum;

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use cookie::Cookie;
use cookie::time::{Duration as CookieDuration, OffsetDateTime};

use crate::config::{CookieOptions, SameSite};

/// Read access to the cookies of an inbound request.
pub trait RequestCookies {
    /// Returns the value of the cookie called `name`, if the request carries one.
    fn cookie(&self, name: &str) -> Option<String>;
}

/// Write access to the cookies of an outbound response.
pub trait ResponseCookies {
    fn set_cookie(&mut self, cookie: SessionCookie);
}

/// A cookie to be sent with `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    /// `None` omits the attribute; zero or less tells the client to drop the cookie.
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
}

impl SessionCookie {
    /// Builds a cookie living for `lifetime_secs`.
    ///
    /// A zero lifetime leaves out `Max-Age` and `Expires`, so the client keeps
    /// the cookie until the browser session ends.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        options: &CookieOptions,
        lifetime_secs: u64,
    ) -> Self {
        let (max_age, expires) = if lifetime_secs == 0 {
            (None, None)
        } else {
            let secs = i64::try_from(lifetime_secs).unwrap_or(i64::MAX);
            let expires =
                TimeDelta::try_seconds(secs).and_then(|ttl| Utc::now().checked_add_signed(ttl));
            (Some(secs), expires)
        };

        Self {
            name: name.into(),
            value: value.into(),
            path: options.path.clone(),
            domain: options.domain.clone(),
            secure: options.secure,
            http_only: options.http_only,
            same_site: options.same_site,
            max_age,
            expires,
        }
    }

    /// Builds an empty, already expired cookie instructing the client to delete `name`.
    pub fn removal(name: impl Into<String>, options: &CookieOptions) -> Self {
        Self {
            max_age: Some(0),
            expires: Some(DateTime::<Utc>::UNIX_EPOCH),
            ..Self::new(name, "", options, 0)
        }
    }

    pub fn is_removal(&self) -> bool {
        self.max_age.is_some_and(|age| age <= 0)
    }

    /// Converts into a [`cookie::Cookie`] carrying the same attributes.
    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), self.value.clone()))
            .secure(self.secure)
            .http_only(self.http_only)
            .same_site(self.same_site.into());

        if !self.path.is_empty() {
            builder = builder.path(self.path.clone());
        }
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(max_age) = self.max_age {
            builder = builder.max_age(CookieDuration::seconds(max_age.max(0)));
        }
        if let Some(expires) = self
            .expires
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok())
        {
            builder = builder.expires(expires);
        }

        builder.build()
    }

    /// Renders the cookie as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        self.to_cookie().to_string()
    }
}

impl From<SameSite> for cookie::SameSite {
    fn from(same_site: SameSite) -> Self {
        match same_site {
            SameSite::None => cookie::SameSite::None,
            SameSite::Lax => cookie::SameSite::Lax,
            SameSite::Strict => cookie::SameSite::Strict,
        }
    }
}

/// Finds `name` in a `Cookie` request header (`a=1; b=2`).
///
/// Malformed pairs are skipped.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

impl RequestCookies for HashMap<String, String> {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl ResponseCookies for Vec<SessionCookie> {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.push(cookie);
    }
}
