//! Caller identities and the contracts that produce them.

use serde::Serialize;

/// Minimal profile of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub role: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Looks identities up by subject id. Backed by whatever store the application uses.
pub trait IdentityProvider: Send + Sync {
    fn find_by_id(&self, id: &str) -> Option<Identity>;
}

/// Checks a username/password pair.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> Option<Identity>;
}
