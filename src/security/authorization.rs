//! Per-route access checks.
//!
//! # Responsibilities
//! - Decide whether a route needs a caller at all
//! - Distinguish "who are you" (401) from "not allowed" (403)
//!
//! # Design Decisions
//! - Checks run in a fixed order and stop at the first failure:
//!   caller present, identity exists, role known, role listed, permissions held
//! - Required roles are matched exactly; only permissions follow the hierarchy

use crate::auth::Principal;
use crate::dispatch::DispatchError;
use crate::observability::metrics;
use crate::security::roles::RoleGraph;

/// What a route demands of its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirements {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// A handler parameter wants the caller's identity.
    pub identity: bool,
}

impl AccessRequirements {
    /// True when the route cannot be served anonymously.
    pub fn requires_caller(&self) -> bool {
        self.identity || self.has_privileges()
    }

    fn has_privileges(&self) -> bool {
        !self.roles.is_empty() || !self.permissions.is_empty()
    }
}

/// Check `principal` against `requirements`.
pub fn authorize(
    requirements: &AccessRequirements,
    principal: Option<&Principal>,
    roles: &RoleGraph,
) -> Result<(), DispatchError> {
    if !requirements.requires_caller() {
        return Ok(());
    }

    let Some(principal) = principal else {
        metrics::record_auth_failure("missing");
        return Err(DispatchError::Unauthenticated("Authentication required".into()));
    };
    let Some(identity) = principal.identity() else {
        metrics::record_auth_failure("unknown_subject");
        return Err(DispatchError::Unauthenticated("Authentication required".into()));
    };

    if !roles.has_role(&identity.role) {
        tracing::warn!(subject = %identity.id, role = %identity.role, "Caller role is not registered");
        return Err(DispatchError::Forbidden("No valid role".into()));
    }

    if !requirements.has_privileges() {
        return Ok(());
    }

    if !requirements.roles.is_empty() && !requirements.roles.iter().any(|r| identity.has_role(r)) {
        return Err(DispatchError::Forbidden("Insufficient role".into()));
    }

    if !roles.has_all_permissions(&identity.role, requirements.permissions.iter().map(String::as_str)) {
        return Err(DispatchError::Forbidden("Insufficient permissions".into()));
    }

    Ok(())
}
