//! `Set-Cookie` values for the access and refresh tokens.

use axum::http::{header, HeaderValue};

use crate::auth::bearer::{ACCESS_COOKIE, REFRESH_COOKIE};
use crate::config::{AuthConfig, CookieConfig};
use crate::http::ResponseHandle;

/// Writes and clears the auth cookies according to `[auth.cookies]`.
#[derive(Debug, Clone)]
pub struct AuthCookies {
    config: CookieConfig,
    refresh_path: String,
}

impl AuthCookies {
    pub fn new(auth: &AuthConfig) -> Self {
        let refresh_path = auth
            .cookies
            .refresh_path
            .clone()
            .unwrap_or_else(|| auth.auth_path.clone());
        Self {
            config: auth.cookies.clone(),
            refresh_path,
        }
    }

    pub fn refresh_path(&self) -> &str {
        &self.refresh_path
    }

    fn build(&self, name: &str, value: &str, path: &str, max_age: u64) -> Option<HeaderValue> {
        let mut cookie = format!("{}={}; Path={}; Max-Age={}", name, value, path, max_age);
        if let Some(domain) = &self.config.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if self.config.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(&self.config.same_site.to_string());

        match HeaderValue::from_str(&cookie) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(cookie = name, "Cookie value is not a valid header, skipped");
                None
            }
        }
    }

    pub fn access(&self, token: &str) -> Option<HeaderValue> {
        self.build(ACCESS_COOKIE, token, &self.config.path, self.config.access_token_max_age)
    }

    pub fn refresh(&self, token: &str) -> Option<HeaderValue> {
        self.build(REFRESH_COOKIE, token, &self.refresh_path, self.config.refresh_token_max_age)
    }

    /// Set both cookies on the response.
    pub fn set(&self, response: &ResponseHandle, access: &str, refresh: &str) {
        for value in [self.access(access), self.refresh(refresh)].into_iter().flatten() {
            response.append_header(header::SET_COOKIE, value);
        }
    }

    /// Expire both cookies.
    pub fn clear(&self, response: &ResponseHandle) {
        let expired = [
            self.build(ACCESS_COOKIE, "", &self.config.path, 0),
            self.build(REFRESH_COOKIE, "", &self.refresh_path, 0),
        ];
        for value in expired.into_iter().flatten() {
            response.append_header(header::SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSite;

    fn cookie_strings(handle: &ResponseHandle) -> Vec<String> {
        handle
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_default_attributes() {
        let cookies = AuthCookies::new(&AuthConfig::default());
        let value = cookies.access("tok").unwrap();
        assert_eq!(
            value,
            "access_token=tok; Path=/; Max-Age=3600; HttpOnly; Secure; SameSite=Strict"
        );
    }

    #[test]
    fn test_refresh_cookie_scoped_to_auth_path() {
        let mut auth = AuthConfig::default();
        auth.cookies.same_site = SameSite::Lax;
        auth.cookies.domain = Some("example.com".into());
        let cookies = AuthCookies::new(&auth);

        let handle = ResponseHandle::new();
        cookies.set(&handle, "a", "r");
        let set = cookie_strings(&handle);
        assert_eq!(set.len(), 2);
        assert!(set[1].starts_with("refresh_token=r; Path=/auth; Max-Age=604800; Domain=example.com"));
        assert!(set[1].ends_with("SameSite=Lax"));
    }

    #[test]
    fn test_clear_sets_zero_max_age() {
        let cookies = AuthCookies::new(&AuthConfig::default());
        let handle = ResponseHandle::new();
        cookies.clear(&handle);
        let set = cookie_strings(&handle);
        assert!(set.iter().all(|c| c.contains("Max-Age=0")));
        assert!(set[0].starts_with("access_token=;"));
    }
}
