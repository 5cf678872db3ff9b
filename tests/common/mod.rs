//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response, StatusCode};
use base64::Engine;
use std::sync::Arc;
use tower::ServiceExt;

use gatehouse::app::{App, UserDirectory};
use gatehouse::clock::ManualClock;
use gatehouse::config::AppConfig;

pub const USER_AGENT: &str = "gatehouse-tests/1.0";
pub const PASSWORD: &str = "correct horse battery staple";

/// Config with a fixed 32+ byte secret and cookies usable over plain HTTP.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.auth.secret = "integration-test-secret-0123456789abcdef".to_string();
    config.auth.cookies.secure = false;
    config
}

/// Users with cheap Argon2 parameters: alice (user), mod (moderator), root (admin).
pub fn test_users() -> Arc<UserDirectory> {
    let params = argon2::Params::new(8, 1, 1, None).unwrap();
    let users = Arc::new(UserDirectory::with_params(params));
    users.add("alice", PASSWORD, "user").unwrap();
    users.add("mod", PASSWORD, "moderator").unwrap();
    users.add("root", PASSWORD, "admin").unwrap();
    users
}

pub struct TestApp {
    pub app: App,
    pub clock: Arc<ManualClock>,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let clock = Arc::new(ManualClock::default());
        let app = App::build(&config, clock.clone(), test_users()).unwrap();
        Self { app, clock, config }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        gatehouse::http::router(&self.config.server, Arc::clone(&self.app.dispatcher))
            .oneshot(request)
            .await
            .unwrap()
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::USER_AGENT, USER_AGENT)
}

pub fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::USER_AGENT, USER_AGENT)
}

pub fn basic(username: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, PASSWORD));
    format!("Basic {}", encoded)
}

pub fn login_body(username: &str, password: &str) -> Body {
    Body::from(serde_json::json!({ "value": username, "password": password }).to_string())
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn assert_status(response: &Response<Body>, status: StatusCode) {
    assert_eq!(response.status(), status, "unexpected status for response {:?}", response);
}
