//! `Authorization: Bearer <token>` and `access_token` cookie authenticators.
//!
//! Both delegate to the token service and bind the token to the request's
//! client IP and user-agent.

use std::sync::Arc;

use axum::http::header;

use crate::auth::authenticator::{AuthScheme, Authenticator, Principal};
use crate::auth::identity::IdentityProvider;
use crate::http::RequestContext;
use crate::observability::metrics;
use crate::security::tokens::{TokenError, TokenKind, TokenService};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn reason(err: TokenError) -> &'static str {
    match err {
        TokenError::InvalidKey => "invalid_key",
        TokenError::Malformed => "malformed",
        TokenError::BadSignature => "bad_signature",
        TokenError::WrongKind => "wrong_kind",
        TokenError::Expired => "expired",
        TokenError::BindingMismatch => "binding_mismatch",
    }
}

fn principal_from_token(
    token: &str,
    request: &RequestContext,
    tokens: &TokenService,
    provider: &Arc<dyn IdentityProvider>,
    scheme: AuthScheme,
) -> Option<Principal> {
    match tokens.validate(token, &request.client_ip, request.user_agent(), TokenKind::Access) {
        Ok(claims) => Some(Principal::deferred(claims.sub, scheme, provider.clone())),
        Err(err) => {
            tracing::debug!(
                request_id = %request.request_id,
                scheme = %scheme,
                error = %err,
                "Token rejected"
            );
            metrics::record_auth_failure(reason(err));
            None
        }
    }
}

pub struct BearerAuthenticator {
    tokens: Arc<TokenService>,
    provider: Arc<dyn IdentityProvider>,
}

impl BearerAuthenticator {
    pub fn new(tokens: Arc<TokenService>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { tokens, provider }
    }
}

impl Authenticator for BearerAuthenticator {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn authenticate(&self, request: &RequestContext) -> Option<Principal> {
        let value = request.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = value.strip_prefix("Bearer ")?.trim();
        if token.is_empty() {
            return None;
        }
        principal_from_token(token, request, &self.tokens, &self.provider, AuthScheme::Bearer)
    }
}

pub struct CookieAuthenticator {
    tokens: Arc<TokenService>,
    provider: Arc<dyn IdentityProvider>,
}

impl CookieAuthenticator {
    pub fn new(tokens: Arc<TokenService>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { tokens, provider }
    }
}

impl Authenticator for CookieAuthenticator {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Cookie
    }

    fn authenticate(&self, request: &RequestContext) -> Option<Principal> {
        let token = request.cookie(ACCESS_COOKIE).filter(|t| !t.is_empty())?;
        principal_from_token(token, request, &self.tokens, &self.provider, AuthScheme::Cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Identity;
    use crate::clock::ManualClock;
    use axum::http::Method;
    use chrono::Duration;

    const UA: &str = "test-agent";

    struct OneUser;

    impl IdentityProvider for OneUser {
        fn find_by_id(&self, id: &str) -> Option<Identity> {
            (id == "1").then(|| Identity::new("1", "alice", "user"))
        }
    }

    fn tokens() -> Arc<TokenService> {
        Arc::new(
            TokenService::new(
                &[7u8; 32],
                Duration::hours(1),
                Duration::days(7),
                Arc::new(ManualClock::default()),
            )
            .unwrap(),
        )
    }

    fn request(header_name: &str, header_value: &str, ip: &str) -> RequestContext {
        RequestContext::builder(Method::GET, "/auth/me")
            .header(header_name, header_value)
            .header("user-agent", UA)
            .client_ip(ip)
            .build()
    }

    #[test]
    fn test_bearer_accepts_bound_token() {
        let tokens = tokens();
        let auth = BearerAuthenticator::new(tokens.clone(), Arc::new(OneUser));
        let token = tokens.issue_access("1", "10.0.0.1", UA);

        let principal = auth
            .authenticate(&request("authorization", &format!("Bearer {token}"), "10.0.0.1"))
            .unwrap();
        assert_eq!(principal.subject(), "1");
        assert!(!principal.is_loaded());
        assert_eq!(principal.identity().unwrap().username, "alice");
    }

    #[test]
    fn test_bearer_rejects_other_ip_and_refresh_tokens() {
        let tokens = tokens();
        let auth = BearerAuthenticator::new(tokens.clone(), Arc::new(OneUser));

        let access = tokens.issue_access("1", "10.0.0.1", UA);
        assert!(auth
            .authenticate(&request("authorization", &format!("Bearer {access}"), "10.0.0.2"))
            .is_none());

        let refresh = tokens.issue_refresh("1", "10.0.0.1", UA);
        assert!(auth
            .authenticate(&request("authorization", &format!("Bearer {refresh}"), "10.0.0.1"))
            .is_none());
    }

    #[test]
    fn test_cookie_authenticator_reads_access_cookie() {
        let tokens = tokens();
        let auth = CookieAuthenticator::new(tokens.clone(), Arc::new(OneUser));
        let token = tokens.issue_access("1", "10.0.0.1", UA);

        let principal = auth
            .authenticate(&request("cookie", &format!("{ACCESS_COOKIE}={token}"), "10.0.0.1"))
            .unwrap();
        assert_eq!(principal.scheme(), AuthScheme::Cookie);
        assert!(auth
            .authenticate(&request("cookie", "access_token=", "10.0.0.1"))
            .is_none());
    }
}
