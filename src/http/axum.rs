//! `HeaderMap` adapters for axum handlers.
//!
//! The request side reads every `Cookie` header; the response side appends
//! one `Set-Cookie` header per cookie, so a handler can return the map as
//! part of its response tuple.

use ::axum::http::header::{COOKIE, SET_COOKIE};
use ::axum::http::{HeaderMap, HeaderValue};

use super::{RequestCookies, ResponseCookies, SessionCookie, find_cookie};

impl RequestCookies for HeaderMap {
    fn cookie(&self, name: &str) -> Option<String> {
        self.get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| find_cookie(header, name))
    }
}

impl ResponseCookies for HeaderMap {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                self.append(SET_COOKIE, value);
            }
            Err(e) => {
                log::error!(target: "enclave_session::http", "msg=\"invalid set-cookie header\" cookie=\"{}\" error=\"{e}\"", cookie.name);
            }
        }
    }
}
