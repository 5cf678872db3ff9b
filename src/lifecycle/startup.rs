//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the token signing secret
//! - Initialize metrics, the application and the listener in order
//! - Hand the server to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last, after every route has compiled

use rand::RngCore;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::app::{App, UserDirectory};
use crate::clock::SystemClock;
use crate::config::{AppConfig, AuthConfig, ConfigError};
use crate::dispatch::ConfigurationError;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::security::TokenError;

pub const ADMIN_PASSWORD_ENV: &str = "GATEHOUSE_ADMIN_PASSWORD";

const GENERATED_SECRET_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("token service: {0}")]
    Tokens(#[from] TokenError),

    #[error(transparent)]
    Routes(#[from] ConfigurationError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The configured secret, or a random one for this process.
pub fn signing_secret(auth: &AuthConfig) -> Vec<u8> {
    if !auth.secret.is_empty() {
        return auth.secret.as_bytes().to_vec();
    }
    tracing::warn!("auth.secret is empty; using a random secret, tokens will not survive a restart");
    let mut secret = vec![0u8; GENERATED_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

fn seed_admin(users: &UserDirectory) {
    let Ok(password) = std::env::var(ADMIN_PASSWORD_ENV) else {
        return;
    };
    if let Err(e) = users.add("admin", &password, "admin") {
        tracing::error!(error = %e, "Failed to seed admin user");
    }
}

/// Run the server until a termination signal arrives.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    let observability = &config.observability;
    if observability.metrics_enabled {
        match observability.metrics_address.parse() {
            Ok(addr) => crate::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let users = Arc::new(UserDirectory::new());
    seed_admin(&users);
    let app = App::build(&config, Arc::new(SystemClock), users)?;

    tracing::info!(
        bind_address = %config.server.bind_address,
        request_timeout_secs = config.server.request_timeout_secs,
        max_body_bytes = config.server.max_body_bytes,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    HttpServer::new(&config, app.dispatcher).run(listener, shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_secret_is_used() {
        let auth = AuthConfig {
            secret: "x".repeat(40),
            ..AuthConfig::default()
        };
        assert_eq!(signing_secret(&auth), "x".repeat(40).into_bytes());
    }

    #[test]
    fn test_empty_secret_is_random() {
        let auth = AuthConfig::default();
        let a = signing_secret(&auth);
        let b = signing_secret(&auth);
        assert_eq!(a.len(), GENERATED_SECRET_BYTES);
        assert_ne!(a, b);
    }
}
