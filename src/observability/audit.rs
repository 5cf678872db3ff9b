//! Audit trail for sensitive routes.
//!
//! # Responsibilities
//! - Capture who called an audited route and with which inputs
//! - Mask sensitive values before they reach the log
//! - Emit one structured event per audited request once its status is known
//!
//! # Design Decisions
//! - Events go through `tracing` under the `gatehouse::audit` target so a
//!   subscriber can filter or route them on their own
//! - Fields whose name contains a secret marker are always `****`; other
//!   string values keep only their first and last two characters unless the
//!   route opts out of masking

use axum::http::StatusCode;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::http::RequestContext;
use crate::routing::PathParams;

pub const AUDIT_TARGET: &str = "gatehouse::audit";

const MASK: &str = "****";
const SECRET_MARKERS: &[&str] = &["password", "token", "apikey", "api_key", "secret"];

/// Audit settings attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPolicy {
    /// Action tag, e.g. `LOGIN_ATTEMPT`.
    pub action: &'static str,
    /// Record query, path and body values.
    pub log_parameters: bool,
    /// Partially mask every recorded string value.
    pub mask_values: bool,
}

impl AuditPolicy {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            log_parameters: true,
            mask_values: true,
        }
    }

    pub fn without_parameters(mut self) -> Self {
        self.log_parameters = false;
        self
    }

    pub fn unmasked(mut self) -> Self {
        self.mask_values = false;
        self
    }
}

impl From<&'static str> for AuditPolicy {
    fn from(action: &'static str) -> Self {
        Self::new(action)
    }
}

pub fn is_secret(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// `alice@example.com` → `al****om`; four characters or fewer → `****`.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        return MASK.to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, MASK, tail)
}

fn scrub(name: &str, value: &Value, mask_values: bool) -> Value {
    if is_secret(name) {
        return Value::String(MASK.to_string());
    }
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, v)| (key.clone(), scrub(key, v, mask_values)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| scrub(name, v, mask_values)).collect()),
        Value::String(s) if mask_values => Value::String(mask(s)),
        other => other.clone(),
    }
}

fn pairs(pairs: impl Iterator<Item = (String, String)>, mask_values: bool) -> Value {
    let fields: Map<String, Value> = pairs.map(|(k, v)| (k, Value::String(v))).collect();
    scrub("", &Value::Object(fields), mask_values)
}

fn parameters(request: &RequestContext, path: &PathParams, mask_values: bool) -> Value {
    let mut recorded = Map::new();

    if let Some(query) = request.query() {
        let query = url::form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned()));
        recorded.insert("query".to_string(), pairs(query, mask_values));
    }
    if !path.is_empty() {
        let captures = path.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        recorded.insert("path".to_string(), pairs(captures, mask_values));
    }
    if !request.body.is_empty() {
        if let Ok(body) = serde_json::from_slice::<Value>(&request.body) {
            recorded.insert("body".to_string(), scrub("", &body, mask_values));
        }
    }

    Value::Object(recorded)
}

/// Request facts captured before the pipeline consumes the request.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    action: &'static str,
    route: Arc<str>,
    method: String,
    path: String,
    client_ip: String,
    user_agent: String,
    subject: Option<String>,
    parameters: Option<Value>,
}

impl AuditEvent {
    pub fn capture(policy: &AuditPolicy, route: &Arc<str>, request: &RequestContext, path: &PathParams) -> Self {
        Self {
            action: policy.action,
            route: Arc::clone(route),
            method: request.method.to_string(),
            path: request.path().to_string(),
            client_ip: request.client_ip.clone(),
            user_agent: request.user_agent().to_string(),
            subject: request.subject().map(str::to_string),
            parameters: policy
                .log_parameters
                .then(|| parameters(request, path, policy.mask_values)),
        }
    }

    pub fn parameters(&self) -> Option<&Value> {
        self.parameters.as_ref()
    }

    pub fn emit(self, status: StatusCode) {
        let outcome = if status.is_success() { "success" } else { "failure" };
        let parameters = self.parameters.map(|p| p.to_string()).unwrap_or_default();
        tracing::info!(
            target: AUDIT_TARGET,
            action = self.action,
            outcome,
            status = status.as_u16(),
            route = %self.route,
            method = %self.method,
            path = %self.path,
            client_ip = %self.client_ip,
            user_agent = %self.user_agent,
            subject = self.subject.as_deref().unwrap_or("-"),
            parameters = %parameters,
            "Audit event"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_mask_keeps_edges() {
        assert_eq!(mask("alice@example.com"), "al****om");
        assert_eq!(mask("bob"), "****");
        assert_eq!(mask("abcd"), "****");
        assert!(is_secret("refreshToken"));
        assert!(is_secret("API_KEY"));
        assert!(!is_secret("value"));
    }

    #[test]
    fn test_capture_masks_parameters() {
        let request = RequestContext::builder(Method::POST, "/auth/login?next=dashboard")
            .header("user-agent", "tests")
            .client_ip("10.0.0.1")
            .body(r#"{"value":"alice@example.com","password":"hunter22","remember":true}"#)
            .build();
        let route: Arc<str> = Arc::from("POST /auth/login");

        let event = AuditEvent::capture(&AuditPolicy::new("LOGIN_ATTEMPT"), &route, &request, &PathParams::default());
        let params = event.parameters().unwrap();
        assert_eq!(params["body"]["value"], "al****om");
        assert_eq!(params["body"]["password"], "****");
        assert_eq!(params["body"]["remember"], true);
        assert_eq!(params["query"]["next"], "da****rd");

        let unmasked = AuditEvent::capture(
            &AuditPolicy::new("LOGIN_ATTEMPT").unmasked(),
            &route,
            &request,
            &PathParams::default(),
        );
        let params = unmasked.parameters().unwrap();
        assert_eq!(params["body"]["value"], "alice@example.com");
        assert_eq!(params["body"]["password"], "****");

        let bare = AuditEvent::capture(
            &AuditPolicy::new("LOGOUT").without_parameters(),
            &route,
            &request,
            &PathParams::default(),
        );
        assert!(bare.parameters().is_none());
    }

    #[test]
    fn test_emit_writes_structured_event() {
        let (captured, _guard) = capture::install();
        let request = RequestContext::builder(Method::POST, "/auth/logout")
            .client_ip("10.0.0.1")
            .build();
        let route: Arc<str> = Arc::from("POST /auth/logout");

        AuditEvent::capture(&"LOGOUT".into(), &route, &request, &PathParams::default()).emit(StatusCode::OK);
        AuditEvent::capture(&"LOGOUT".into(), &route, &request, &PathParams::default())
            .emit(StatusCode::UNAUTHORIZED);

        let events = captured.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["action"], "LOGOUT");
        assert_eq!(events[0]["outcome"], "success");
        assert_eq!(events[0]["status"], "200");
        assert_eq!(events[0]["client_ip"], "10.0.0.1");
        assert_eq!(events[0]["subject"], "-");
        assert_eq!(events[1]["outcome"], "failure");
        assert_eq!(events[1]["status"], "401");
    }
}
