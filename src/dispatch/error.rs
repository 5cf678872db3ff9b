//! Error taxonomy for registration and request dispatch.

use axum::http::{Method, StatusCode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A problem with the route table or a handler declaration.
///
/// Raised while building the dispatcher; the process must not start serving.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("duplicate route {method} {template}")]
    DuplicateRoute { method: Method, template: String },

    #[error("invalid route template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("route {route}: parameter `{param}` is not claimed by any parameter handler")]
    UnhandledParameter { route: String, param: String },

    #[error("route {route}: parameter `{param}` is claimed by several handlers ({handlers})")]
    AmbiguousParameter {
        route: String,
        param: String,
        handlers: String,
    },

    #[error("route {route}: parameter `{param}`: {reason}")]
    InvalidParameter {
        route: String,
        param: String,
        reason: String,
    },

    #[error("role graph: {0}")]
    Roles(String),
}

/// A request-level failure. Every stage of the pipeline fails into one of these.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error("{0}")]
    Gone(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("{0}")]
    RateLimited(String),

    #[error("internal error: {0}")]
    Internal(BoxError),
}

impl DispatchError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(err: impl Into<BoxError>) -> Self {
        Self::Internal(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Gone(_) => StatusCode::GONE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message placed in the error envelope. Internal detail never leaves the server.
    pub fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::MethodNotAllowed { .. } => "method_not_allowed",
            Self::Gone(_) => "gone",
            Self::PayloadTooLarge => "payload_too_large",
            Self::RateLimited(_) => "rate_limited",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = DispatchError::internal("database password is hunter2");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_validation_messages_are_joined() {
        let err = DispatchError::Validation(vec![
            "username must not be blank".into(),
            "email must be a valid email address".into(),
        ]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.client_message(),
            "username must not be blank; email must be a valid email address"
        );
    }
}
