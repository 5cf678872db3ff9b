//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in registration order
//! - Look up the first (verb, path) match and its captures
//! - Report 405 when the path exists under other verbs only
//!
//! # Design Decisions
//! - Immutable after construction (shared across requests without locks)
//! - O(n) scan in insertion order; first registered wins on overlap
//! - Explicit NotFound rather than silent default

use axum::http::Method;
use std::sync::Arc;

use crate::dispatch::ConfigurationError;
use crate::routing::pattern::PathParams;
use crate::routing::route::RouteDescriptor;

/// Result of a lookup.
#[derive(Debug)]
pub enum RouteMatch<'a> {
    Found {
        route: &'a Arc<RouteDescriptor>,
        params: PathParams,
    },
    /// The path matched, but only under these verbs.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Arc<RouteDescriptor>>,
    strict_duplicates: bool,
}

impl RouteTable {
    pub fn new(strict_duplicates: bool) -> Self {
        Self {
            routes: Vec::new(),
            strict_duplicates,
        }
    }

    /// Add a route. An exact (verb, template) repeat is ignored with a warning,
    /// or rejected when strict duplicates are on. Returns whether it was stored.
    pub fn register(&mut self, route: RouteDescriptor) -> Result<bool, ConfigurationError> {
        let duplicate = self
            .routes
            .iter()
            .any(|r| r.method == route.method && r.template() == route.template());
        if duplicate {
            if self.strict_duplicates {
                return Err(ConfigurationError::DuplicateRoute {
                    method: route.method.clone(),
                    template: route.template().to_string(),
                });
            }
            tracing::warn!(
                method = %route.method,
                template = %route.template(),
                "Duplicate route ignored, keeping the first registration"
            );
            return Ok(false);
        }

        tracing::debug!(route = %route.id, regex = %route.pattern.as_regex(), "Registered route");
        self.routes.push(Arc::new(route));
        Ok(true)
    }

    pub fn lookup(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method == *method {
                return RouteMatch::Found { route, params };
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(allowed)
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.routes.iter()
    }
}
