//! Reference application served by the `gatehouse` binary.
//!
//! # Responsibilities
//! - Assemble token service, authenticators, role graph and routes from config
//! - Provide an in-memory user directory behind the identity contracts
//!
//! # Design Decisions
//! - Built-in roles `user → moderator → admin`; `[[roles]]` entries from config
//!   are registered after them and replace same-id built-ins
//! - Login refuses the `max_attempts`-th attempt of a window, refresh the one after it

pub mod routes;
pub mod users;

use std::sync::Arc;

use crate::auth::{AuthCookies, BasicAuthenticator, BearerAuthenticator, CookieAuthenticator};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::dispatch::Dispatcher;
use crate::lifecycle::startup::{signing_secret, StartupError};
use crate::security::{RateLimitPolicy, RequestLimits, RoleDefinition, RoleGraph, TokenService};

pub use routes::{AuthState, LoginRequest};
pub use users::{UserDirectory, UserError};

/// Built-in role hierarchy.
pub fn default_roles() -> Vec<RoleDefinition> {
    vec![
        RoleDefinition::new("user")
            .permission("profile.read")
            .permission("files.write"),
        RoleDefinition::new("moderator")
            .permission("users.read")
            .parent("user"),
        RoleDefinition::new("admin")
            .permission("users.write")
            .permission("roles.manage")
            .parent("moderator"),
    ]
}

pub fn role_graph(config: &AppConfig) -> RoleGraph {
    let mut builder = RoleGraph::builder();
    for role in default_roles().iter().chain(&config.roles) {
        builder.register(role);
    }
    builder.build()
}

/// A wired application.
#[derive(Debug)]
pub struct App {
    pub dispatcher: Arc<Dispatcher>,
    pub users: Arc<UserDirectory>,
    pub tokens: Arc<TokenService>,
}

impl App {
    pub fn build(config: &AppConfig, clock: Arc<dyn Clock>, users: Arc<UserDirectory>) -> Result<Self, StartupError> {
        let auth = &config.auth;
        let tokens = Arc::new(TokenService::new(
            &signing_secret(auth),
            auth.access_ttl(),
            auth.refresh_ttl(),
            Arc::clone(&clock),
        )?);

        let state = AuthState {
            users: Arc::clone(&users),
            tokens: Arc::clone(&tokens),
            cookies: AuthCookies::new(auth),
        };

        let refresh_limit = RateLimitPolicy::from_config(&config.rate_limit);
        let mut login_limit = refresh_limit.clone();
        login_limit.max_attempts = login_limit.max_attempts.saturating_sub(1).max(1);

        let mut builder = Dispatcher::builder()
            .clock(clock)
            .strict_duplicates(config.routing.strict_duplicates)
            .roles(role_graph(config))
            .middleware(Arc::new(RequestLimits::from_config(&config.server)))
            .authenticator(Arc::new(BearerAuthenticator::new(Arc::clone(&tokens), users.clone())))
            .authenticator(Arc::new(CookieAuthenticator::new(Arc::clone(&tokens), users.clone())))
            .authenticator(Arc::new(BasicAuthenticator::new(users.clone())));
        for route in routes::routes(&auth.auth_path, &state, login_limit, refresh_limit) {
            builder = builder.route(route);
        }

        Ok(Self {
            dispatcher: Arc::new(builder.build()?),
            users,
            tokens,
        })
    }
}
