//! actix-web adapters: read cookies from `HttpRequest`, write them through
//! an `HttpResponseBuilder`.

use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite as ActixSameSite};
use actix_web::{HttpRequest, HttpResponseBuilder};

use super::{RequestCookies, ResponseCookies, SessionCookie};
use crate::config::SameSite;

fn build_actix_cookie(cookie: SessionCookie) -> Cookie<'static> {
    let same_site = match cookie.same_site {
        SameSite::None => ActixSameSite::None,
        SameSite::Lax => ActixSameSite::Lax,
        SameSite::Strict => ActixSameSite::Strict,
    };

    let mut built = Cookie::build(cookie.name, cookie.value)
        .secure(cookie.secure)
        .http_only(cookie.http_only)
        .same_site(same_site)
        .finish();

    if !cookie.path.is_empty() {
        built.set_path(cookie.path);
    }
    if let Some(domain) = cookie.domain {
        built.set_domain(domain);
    }
    if let Some(max_age) = cookie.max_age {
        built.set_max_age(CookieDuration::seconds(max_age.max(0)));
    }
    if let Some(expires) = cookie
        .expires
        .and_then(|at| OffsetDateTime::from_unix_timestamp(at.timestamp()).ok())
    {
        built.set_expires(expires);
    }

    built
}

impl RequestCookies for HttpRequest {
    fn cookie(&self, name: &str) -> Option<String> {
        HttpRequest::cookie(self, name).map(|c| c.value().to_owned())
    }
}

impl ResponseCookies for HttpResponseBuilder {
    fn set_cookie(&mut self, cookie: SessionCookie) {
        self.cookie(build_actix_cookie(cookie));
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::http::header::SET_COOKIE;
    use actix_web::test::TestRequest;

    use super::*;
    use crate::config::CookieOptions;

    #[test]
    fn test_reads_request_cookie() {
        let req = TestRequest::default()
            .insert_header(("cookie", "sid=abc; theme=dark"))
            .to_http_request();

        assert_eq!(RequestCookies::cookie(&req, "sid"), Some("abc".to_owned()));
        assert_eq!(RequestCookies::cookie(&req, "missing"), None);
    }

    #[test]
    fn test_writes_set_cookie() {
        let mut builder = HttpResponseBuilder::new(StatusCode::OK);
        builder.set_cookie(SessionCookie::new("sid", "abc", &CookieOptions::default(), 60));
        let response = builder.finish();

        let header = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let cookie = Cookie::parse(header).unwrap();
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(ActixSameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(60)));
        assert!(cookie.expires_datetime().is_some());
    }

    #[test]
    fn test_writes_removal_cookie() {
        let options = CookieOptions::default();
        let mut builder = HttpResponseBuilder::new(StatusCode::OK);
        builder.set_cookie(SessionCookie::removal("sid", &options));
        let response = builder.finish();

        let cookie = response.cookies().next().unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(
            cookie.expires_datetime(),
            Some(OffsetDateTime::UNIX_EPOCH)
        );
    }
}
