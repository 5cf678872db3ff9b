//! In-memory user directory with Argon2id password hashes.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::auth::{CredentialVerifier, Identity, IdentityProvider};

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("username `{0}` is taken")]
    Taken(String),
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
}

/// Users keyed by id, with a username index for logins.
#[derive(Debug)]
pub struct UserDirectory {
    users: DashMap<String, StoredUser>,
    by_name: DashMap<String, String>,
    next_id: AtomicU64,
    params: Params,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::with_params(Params::default())
    }

    /// Custom Argon2 cost parameters (cheap ones keep tests fast).
    pub fn with_params(params: Params) -> Self {
        Self {
            users: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU64::new(1),
            params,
        }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn add(&self, username: &str, password: &str, role: &str) -> Result<Identity, UserError> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(UserError::Hash)?;
        let password_hash = self
            .hasher()
            .hash_password(password.as_bytes(), &salt)
            .map_err(UserError::Hash)?
            .to_string();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        match self.by_name.entry(username.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => return Err(UserError::Taken(username.to_string())),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let identity = Identity::new(id.clone(), username, role);
        self.users.insert(
            id,
            StoredUser {
                identity: identity.clone(),
                password_hash,
            },
        );
        tracing::info!(user_id = %identity.id, username, role, "User added");
        Ok(identity)
    }

    /// Users in id order, optionally restricted to one role.
    pub fn list(&self, role: Option<&str>) -> Vec<Identity> {
        let mut users: Vec<Identity> = self
            .users
            .iter()
            .map(|entry| entry.identity.clone())
            .filter(|identity| role.map_or(true, |r| identity.has_role(r)))
            .collect();
        users.sort_by_key(|identity| identity.id.parse::<u64>().unwrap_or(u64::MAX));
        users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for UserDirectory {
    fn find_by_id(&self, id: &str) -> Option<Identity> {
        self.users.get(id).map(|user| user.identity.clone())
    }
}

impl CredentialVerifier for UserDirectory {
    fn verify(&self, username: &str, password: &str) -> Option<Identity> {
        let id = self.by_name.get(username)?.value().clone();
        let user = self.users.get(&id)?;
        let parsed = PasswordHash::new(&user.password_hash).ok()?;
        self.hasher()
            .verify_password(password.as_bytes(), &parsed)
            .ok()
            .map(|_| user.identity.clone())
    }
}
