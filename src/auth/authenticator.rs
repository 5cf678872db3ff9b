//! Pluggable authentication strategies and the resolver that picks one.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → AuthResolver (accepted schemes for the route, registration order)
//!     → Authenticator::authenticate (first Some wins)
//!     → Principal (subject id now, identity on first use)
//! ```
//!
//! # Design Decisions
//! - No match is not an error here; the authorization stage decides whether
//!   anonymous is acceptable
//! - Token-based principals defer the identity lookup until something asks

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::auth::identity::{Identity, IdentityProvider};
use crate::http::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    Bearer,
    Cookie,
    Basic,
    /// Application-defined scheme.
    Custom(&'static str),
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Bearer => f.write_str("bearer"),
            AuthScheme::Cookie => f.write_str("cookie"),
            AuthScheme::Basic => f.write_str("basic"),
            AuthScheme::Custom(name) => f.write_str(name),
        }
    }
}

/// Turns a request into a principal, or declines.
pub trait Authenticator: Send + Sync {
    fn scheme(&self) -> AuthScheme;
    fn authenticate(&self, request: &RequestContext) -> Option<Principal>;
}

/// The authenticated side of a request.
pub struct Principal {
    subject: String,
    scheme: AuthScheme,
    identity: OnceLock<Option<Identity>>,
    provider: Option<Arc<dyn IdentityProvider>>,
}

impl Principal {
    /// Subject known, identity fetched from `provider` on first access.
    pub fn deferred(
        subject: impl Into<String>,
        scheme: AuthScheme,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            subject: subject.into(),
            scheme,
            identity: OnceLock::new(),
            provider: Some(provider),
        }
    }

    /// Identity already in hand (e.g. verified credentials).
    pub fn resolved(identity: Identity, scheme: AuthScheme) -> Self {
        let subject = identity.id.clone();
        Self {
            subject,
            scheme,
            identity: OnceLock::from(Some(identity)),
            provider: None,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// The caller's identity. `None` when the subject no longer exists.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity
            .get_or_init(|| {
                let found = self.provider.as_ref().and_then(|p| p.find_by_id(&self.subject));
                if found.is_none() {
                    tracing::debug!(subject = %self.subject, "Principal has no backing identity");
                }
                found
            })
            .as_ref()
    }

    /// True once the identity has been fetched (or was supplied up front).
    pub fn is_loaded(&self) -> bool {
        self.identity.get().is_some()
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("subject", &self.subject)
            .field("scheme", &self.scheme)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Ordered set of authenticators.
#[derive(Default, Clone)]
pub struct AuthResolver {
    authenticators: Vec<Arc<dyn Authenticator>>,
}

impl AuthResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, authenticator: Arc<dyn Authenticator>) {
        tracing::debug!(scheme = %authenticator.scheme(), "Registered authenticator");
        self.authenticators.push(authenticator);
    }

    pub fn schemes(&self) -> Vec<AuthScheme> {
        self.authenticators.iter().map(|a| a.scheme()).collect()
    }

    /// Try every authenticator whose scheme is accepted, in registration order.
    ///
    /// `accepted = None` accepts every registered scheme; an empty list accepts none.
    pub fn resolve(&self, request: &RequestContext, accepted: Option<&[AuthScheme]>) -> Option<Principal> {
        self.authenticators
            .iter()
            .filter(|a| accepted.map_or(true, |schemes| schemes.contains(&a.scheme())))
            .find_map(|a| a.authenticate(request))
    }
}

impl fmt::Debug for AuthResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResolver")
            .field("schemes", &self.schemes())
            .finish()
    }
}
