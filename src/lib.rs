//! Gatehouse: HTTP dispatch and guard core.
//!
//! Routes are declared in code, compiled once at startup and served by a
//! dispatcher that matches, authenticates, authorizes, rate limits, binds
//! parameters and renders every request.

// Core pipeline
pub mod binding;
pub mod dispatch;
pub mod http;
pub mod routing;

// Identity and access
pub mod auth;
pub mod security;

// Cross-cutting concerns
pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod observability;

// Reference application
pub mod app;

pub use config::AppConfig;
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RouteSpec;
