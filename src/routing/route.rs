//! Route declarations and their compiled form.

use axum::http::Method;
use std::sync::Arc;

use crate::auth::AuthScheme;
use crate::binding::{BindingPlan, ParameterDescriptor};
use crate::dispatch::Handler;
use crate::observability::AuditPolicy;
use crate::routing::pattern::PathPattern;
use crate::security::{AccessRequirements, RateLimitPolicy};

/// A route as declared by application code.
pub struct RouteSpec {
    pub(crate) method: Method,
    pub(crate) template: String,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) name: Option<String>,
    pub(crate) params: Vec<ParameterDescriptor>,
    pub(crate) roles: Vec<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) auth_schemes: Option<Vec<AuthScheme>>,
    pub(crate) rate_limit: Option<RateLimitPolicy>,
    pub(crate) audit: Option<AuditPolicy>,
}

impl RouteSpec {
    pub fn new(method: Method, template: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            template: template.into(),
            handler: Arc::new(handler),
            name: None,
            params: Vec::new(),
            roles: Vec::new(),
            permissions: Vec::new(),
            auth_schemes: None,
            rate_limit: None,
            audit: None,
        }
    }

    pub fn get(template: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, template, handler)
    }

    pub fn post(template: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, template, handler)
    }

    pub fn put(template: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, template, handler)
    }

    pub fn delete(template: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, template, handler)
    }

    /// Label used in logs, metrics and rate keys. Defaults to "VERB template".
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Restrict authentication to these schemes. An empty list means anonymous only.
    pub fn auth_schemes(mut self, schemes: impl IntoIterator<Item = AuthScheme>) -> Self {
        self.auth_schemes = Some(schemes.into_iter().collect());
        self
    }

    pub fn rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = Some(policy);
        self
    }

    /// Emit an audit event for every request to this route.
    pub fn audit(mut self, policy: impl Into<AuditPolicy>) -> Self {
        self.audit = Some(policy.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub(crate) fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.method, self.template))
    }
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// A compiled, immutable route.
pub struct RouteDescriptor {
    pub id: Arc<str>,
    pub method: Method,
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
    pub params: Vec<ParameterDescriptor>,
    pub access: AccessRequirements,
    pub auth_schemes: Option<Vec<AuthScheme>>,
    pub rate_limit: Option<RateLimitPolicy>,
    pub audit: Option<AuditPolicy>,
    pub(crate) plan: BindingPlan,
}

impl RouteDescriptor {
    pub fn template(&self) -> &str {
        self.pattern.template()
    }

    /// Whether the authentication stage runs for this route. Audited routes
    /// resolve the caller so the event can name them.
    pub fn authenticates(&self) -> bool {
        self.access.requires_caller()
            || self.audit.is_some()
            || self
                .params
                .iter()
                .any(|p| matches!(p.source, crate::binding::ParamSource::Identity))
            || matches!(
                self.rate_limit.as_ref().map(|p| p.key),
                Some(crate::security::RateKeySource::Subject)
            )
    }
}

impl std::fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("template", &self.pattern.template())
            .field("access", &self.access)
            .field("rate_limit", &self.rate_limit)
            .field("audit", &self.audit.as_ref().map(|a| a.action))
            .finish_non_exhaustive()
    }
}
