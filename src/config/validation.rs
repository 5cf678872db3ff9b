//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject insecure combinations (short secrets, SameSite=None without Secure)
//! - Check role declarations are unique and named
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, SameSite, MAX_DURATION_SECS};

/// Minimum accepted length of a configured signing secret, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_duration(errors: &mut Vec<ValidationError>, field: &str, secs: u64) {
    if secs > MAX_DURATION_SECS {
        errors.push(ValidationError::new(
            field,
            format!("must be at most {} seconds", MAX_DURATION_SECS),
        ));
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let server = &config.server;
    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "must be a socket address"));
    }
    if server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than 0"));
    }
    if server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if server.max_uri_length == 0 {
        errors.push(ValidationError::new("server.max_uri_length", "must be greater than 0"));
    }
    if server.max_header_count == 0 {
        errors.push(ValidationError::new("server.max_header_count", "must be greater than 0"));
    }

    let auth = &config.auth;
    if !auth.secret.is_empty() && auth.secret.len() < MIN_SECRET_BYTES {
        errors.push(ValidationError::new(
            "auth.secret",
            format!("must be at least {} bytes", MIN_SECRET_BYTES),
        ));
    }
    if auth.access_token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.access_token_ttl_secs", "must be greater than 0"));
    }
    check_duration(&mut errors, "auth.access_token_ttl_secs", auth.access_token_ttl_secs);
    check_duration(&mut errors, "auth.refresh_token_ttl_secs", auth.refresh_token_ttl_secs);
    if auth.refresh_token_ttl_secs < auth.access_token_ttl_secs {
        errors.push(ValidationError::new(
            "auth.refresh_token_ttl_secs",
            "must not be shorter than the access token lifetime",
        ));
    }
    if !auth.auth_path.starts_with('/') {
        errors.push(ValidationError::new("auth.auth_path", "must start with '/'"));
    }
    if auth.cookies.same_site == SameSite::None && !auth.cookies.secure {
        errors.push(ValidationError::new(
            "auth.cookies.same_site",
            "SameSite=None requires secure = true",
        ));
    }
    if !auth.cookies.path.starts_with('/') {
        errors.push(ValidationError::new("auth.cookies.path", "must start with '/'"));
    }

    let rate = &config.rate_limit;
    if rate.max_attempts == 0 {
        errors.push(ValidationError::new("rate_limit.max_attempts", "must be greater than 0"));
    }
    if rate.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    check_duration(&mut errors, "rate_limit.window_secs", rate.window_secs);
    if rate.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for (i, role) in config.roles.iter().enumerate() {
        if role.id.trim().is_empty() {
            errors.push(ValidationError::new(format!("roles[{}].id", i), "must not be empty"));
        } else if !seen.insert(role.id.as_str()) {
            errors.push(ValidationError::new(
                format!("roles[{}].id", i),
                format!("duplicate role '{}'", role.id),
            ));
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
