//! `Authorization: Basic` credentials checked against a `CredentialVerifier`.

use std::sync::Arc;

use axum::http::header;
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::auth::authenticator::{AuthScheme, Authenticator, Principal};
use crate::auth::identity::CredentialVerifier;
use crate::http::RequestContext;
use crate::observability::metrics;

pub struct BasicAuthenticator {
    verifier: Arc<dyn CredentialVerifier>,
}

impl BasicAuthenticator {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }
}

fn decode(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

impl Authenticator for BasicAuthenticator {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Basic
    }

    fn authenticate(&self, request: &RequestContext) -> Option<Principal> {
        let value = request.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let encoded = value.strip_prefix("Basic ")?.trim();
        let Some((user, password)) = decode(encoded) else {
            metrics::record_auth_failure("malformed");
            return None;
        };
        match self.verifier.verify(&user, &password) {
            Some(identity) => Some(Principal::resolved(identity, AuthScheme::Basic)),
            None => {
                tracing::debug!(request_id = %request.request_id, user = %user, "Basic credentials rejected");
                metrics::record_auth_failure("bad_credentials");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Identity;
    use axum::http::Method;

    struct Fixed;

    impl CredentialVerifier for Fixed {
        fn verify(&self, username: &str, password: &str) -> Option<Identity> {
            (username == "svc" && password == "p:ss").then(|| Identity::new("9", "svc", "admin"))
        }
    }

    fn request(value: &str) -> RequestContext {
        RequestContext::builder(Method::GET, "/")
            .header("authorization", value)
            .build()
    }

    #[test]
    fn test_valid_credentials() {
        let auth = BasicAuthenticator::new(Arc::new(Fixed));
        let value = format!("Basic {}", STANDARD.encode("svc:p:ss"));
        let principal = auth.authenticate(&request(&value)).unwrap();
        assert_eq!(principal.subject(), "9");
        assert!(principal.is_loaded());
    }

    #[test]
    fn test_wrong_or_garbled_credentials() {
        let auth = BasicAuthenticator::new(Arc::new(Fixed));
        let wrong = format!("Basic {}", STANDARD.encode("svc:nope"));
        assert!(auth.authenticate(&request(&wrong)).is_none());
        assert!(auth.authenticate(&request("Basic !!!")).is_none());
        assert!(auth.authenticate(&request("Bearer abc")).is_none());
    }
}
