//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Longest accepted token lifetime or rate window: 100 years.
pub const MAX_DURATION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Seconds as a `chrono` duration, saturating instead of overflowing.
pub fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

use crate::security::roles::RoleDefinition;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener and request limits.
    pub server: ServerConfig,

    /// Token signing and cookie policy.
    pub auth: AuthConfig,

    /// Defaults for rate-limited routes.
    pub rate_limit: RateLimitConfig,

    /// Route table behaviour.
    pub routing: RoutingConfig,

    /// Declarative roles, merged with programmatic registrations.
    pub roles: Vec<RoleDefinition>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener and per-request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,

    /// Whole-request timeout.
    pub request_timeout_secs: u64,

    /// Take the client IP from the first `X-Forwarded-For` entry.
    pub trust_forwarded_headers: bool,

    /// Longest accepted request URI (414 beyond).
    pub max_uri_length: usize,

    /// Most headers accepted on one request (431 beyond).
    pub max_header_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 30,
            trust_forwarded_headers: false,
            max_uri_length: 8 * 1024,
            max_header_count: 100,
        }
    }
}

/// Token service and auth endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret. Empty means a random per-process secret.
    pub secret: String,

    pub access_token_ttl_secs: u64,

    pub refresh_token_ttl_secs: u64,

    /// Mount point of the auth endpoints; also the default refresh cookie path.
    pub auth_path: String,

    pub cookies: CookieConfig,
}

impl AuthConfig {
    pub fn access_ttl(&self) -> chrono::Duration {
        seconds(self.access_token_ttl_secs)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        seconds(self.refresh_token_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 604_800,
            auth_path: "/auth".to_string(),
            cookies: CookieConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        };
        f.write_str(value)
    }
}

/// Attributes of the `access_token` / `refresh_token` cookies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    pub same_site: SameSite,
    pub secure: bool,
    pub http_only: bool,
    pub domain: Option<String>,
    pub path: String,
    pub access_token_max_age: u64,
    pub refresh_token_max_age: u64,
    /// Refresh cookie path. Falls back to `auth.auth_path`.
    pub refresh_path: Option<String>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            same_site: SameSite::Strict,
            secure: true,
            http_only: true,
            domain: None,
            path: "/".to_string(),
            access_token_max_age: 3600,
            refresh_token_max_age: 604_800,
            refresh_path: None,
        }
    }
}

/// Defaults for routes that opt in to rate limiting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
    /// Message returned with the 429.
    pub message: String,
    /// How often expired windows are purged.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> chrono::Duration {
        seconds(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 900,
            message: crate::security::rate_limit::DEFAULT_MESSAGE.to_string(),
            sweep_interval_secs: 60,
        }
    }
}

/// Route table behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// Treat duplicate (verb, template) pairs as a startup error instead of a warning.
    pub strict_duplicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address for the metrics listener.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "gatehouse=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
