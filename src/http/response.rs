//! Response shaping.
//!
//! # Responsibilities
//! - Structured responses that carry their own status, headers and body
//! - The JSON error envelope `{uri, status, message}`
//! - The success envelope for plain string results
//! - A shared handle that handlers use to add headers (cookies) to the reply
//!
//! # Design Decisions
//! - Handlers return a `Reply`; only `Reply::Entity` controls its own status
//! - Internal error detail never reaches the envelope

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

use crate::dispatch::DispatchError;

const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    uri: &'a str,
    status: u16,
    message: T,
    /// Individual validation failures, alongside the joined `message`.
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [String]>,
}

fn envelope_bytes<T: Serialize>(uri: &str, status: StatusCode, message: T) -> Bytes {
    envelope_with_errors(uri, status, message, None)
}

fn envelope_with_errors<T: Serialize>(
    uri: &str,
    status: StatusCode,
    message: T,
    errors: Option<&[String]>,
) -> Bytes {
    let envelope = Envelope {
        uri,
        status: status.as_u16(),
        message,
        errors,
    };
    serde_json::to_vec(&envelope).map(Bytes::from).unwrap_or_default()
}

/// A response with explicit status, headers and body.
#[derive(Debug, Clone)]
pub struct ResponseEntity {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ResponseEntity {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn created() -> Self {
        Self::new(StatusCode::CREATED)
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// JSON body from any serializable value.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, DispatchError> {
        self.body = Bytes::from(serde_json::to_vec(value)?);
        self.headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
        Ok(self)
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.body = Bytes::from(text.into());
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        self
    }

    pub fn bytes(mut self, body: impl Into<Bytes>, content_type: HeaderValue) -> Self {
        self.body = body.into();
        self.headers.insert(header::CONTENT_TYPE, content_type);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// The error envelope for `err` at `uri`.
    pub fn error(uri: &str, err: &DispatchError) -> Self {
        let status = err.status();
        let mut entity = Self::new(status);
        let errors = match err {
            DispatchError::Validation(list) => Some(list.as_slice()),
            _ => None,
        };
        entity.body = envelope_with_errors(uri, status, err.client_message(), errors);
        entity.headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
        if let DispatchError::MethodNotAllowed { allowed } = err {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                entity.headers.insert(header::ALLOW, value);
            }
        }
        entity
    }

    /// A bare error envelope with a given status, for middleware short-circuits.
    pub fn status_message(uri: &str, status: StatusCode, message: &str) -> Self {
        let mut entity = Self::new(status);
        entity.body = envelope_bytes(uri, status, message);
        entity.headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
        entity
    }
}

impl IntoResponse for ResponseEntity {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// What a handler returns.
#[derive(Debug)]
pub enum Reply {
    /// Honoured as-is.
    Entity(ResponseEntity),
    /// Wrapped in the success envelope.
    Text(String),
    /// Written raw.
    Bytes(Bytes),
    /// Serialized directly.
    Json(serde_json::Value),
    /// 204 No Content.
    Empty,
}

impl Reply {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, DispatchError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Render into an entity. Plain results default to 200.
    pub fn into_entity(self, uri: &str) -> ResponseEntity {
        match self {
            Reply::Entity(entity) => entity,
            Reply::Text(text) => {
                let mut entity = ResponseEntity::ok();
                entity.body = envelope_bytes(uri, StatusCode::OK, text);
                entity.headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
                entity
            }
            Reply::Bytes(body) => ResponseEntity::ok()
                .bytes(body, HeaderValue::from_static("application/octet-stream")),
            Reply::Json(value) => {
                let mut entity = ResponseEntity::ok();
                entity.body = serde_json::to_vec(&value).map(Bytes::from).unwrap_or_default();
                entity.headers.insert(header::CONTENT_TYPE, APPLICATION_JSON);
                entity
            }
            Reply::Empty => ResponseEntity::no_content(),
        }
    }
}

impl From<ResponseEntity> for Reply {
    fn from(entity: ResponseEntity) -> Self {
        Reply::Entity(entity)
    }
}

#[derive(Debug, Default)]
struct ResponseParts {
    status: Option<StatusCode>,
    headers: HeaderMap,
}

/// Injected response. Headers added here are merged into the final reply.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    parts: Arc<Mutex<ResponseParts>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        let mut parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        parts.headers.append(name, value);
    }

    /// Status for non-entity replies.
    pub fn set_status(&self, status: StatusCode) {
        let mut parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        parts.status = Some(status);
    }

    pub fn headers(&self) -> HeaderMap {
        let parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        parts.headers.clone()
    }

    /// Merge recorded headers (and status, unless the reply is an entity) into `entity`.
    pub fn apply(&self, entity: &mut ResponseEntity, honour_status: bool) {
        let mut parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        if honour_status {
            if let Some(status) = parts.status {
                entity.status = status;
            }
        }
        for (name, value) in parts.headers.drain() {
            if let Some(name) = name {
                entity.headers.append(name, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn body_json(entity: &ResponseEntity) -> serde_json::Value {
        serde_json::from_slice(&entity.body).unwrap()
    }

    #[test]
    fn test_error_envelope_shape() {
        let entity = ResponseEntity::error("/users/7", &DispatchError::not_found("User not found"));
        assert_eq!(entity.status, StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(&entity),
            serde_json::json!({"uri": "/users/7", "status": 404, "message": "User not found"})
        );
    }

    #[test]
    fn test_validation_errors_listed() {
        let err = DispatchError::Validation(vec![
            "value must not be blank".to_string(),
            "password must not be blank".to_string(),
        ]);
        let body = body_json(&ResponseEntity::error("/auth/login", &err));
        assert_eq!(body["status"], 400);
        assert_eq!(body["message"], "value must not be blank; password must not be blank");
        assert_eq!(
            body["errors"],
            serde_json::json!(["value must not be blank", "password must not be blank"])
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let err = DispatchError::MethodNotAllowed {
            allowed: vec![Method::GET, Method::DELETE],
        };
        let entity = ResponseEntity::error("/users/7", &err);
        assert_eq!(entity.headers.get(header::ALLOW).unwrap(), "GET, DELETE");
    }

    #[test]
    fn test_text_reply_is_enveloped() {
        let entity = Reply::text("pong").into_entity("/ping");
        assert_eq!(
            body_json(&entity),
            serde_json::json!({"uri": "/ping", "status": 200, "message": "pong"})
        );
    }

    #[test]
    fn test_json_reply_is_not_enveloped() {
        let entity = Reply::json(&serde_json::json!({"id": 1})).unwrap().into_entity("/x");
        assert_eq!(body_json(&entity), serde_json::json!({"id": 1}));
    }

    #[test]
    fn test_handle_merges_headers() {
        let handle = ResponseHandle::new();
        handle.append_header(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        handle.append_header(header::SET_COOKIE, HeaderValue::from_static("b=2"));
        handle.set_status(StatusCode::CREATED);

        let mut entity = Reply::Empty.into_entity("/");
        handle.apply(&mut entity, true);
        assert_eq!(entity.status, StatusCode::CREATED);
        assert_eq!(entity.headers.get_all(header::SET_COOKIE).iter().count(), 2);
    }
}
