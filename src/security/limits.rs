//! Request limits.
//!
//! # Responsibilities
//! - Enforce maximum URI length
//! - Enforce maximum header count
//!
//! # Design Decisions
//! - Runs in the received phase, before route matching, so an oversized
//!   request to an unknown path is still 414 or 431
//! - Body size is enforced earlier, while buffering (413)
//! - Return 414 URI Too Long or 431 Request Header Fields Too Large

use axum::http::StatusCode;

use crate::config::ServerConfig;
use crate::dispatch::{Flow, Middleware, Phase};
use crate::http::{RequestContext, ResponseEntity};

#[derive(Debug, Clone)]
pub struct RequestLimits {
    max_uri_length: usize,
    max_header_count: usize,
}

impl RequestLimits {
    pub fn new(max_uri_length: usize, max_header_count: usize) -> Self {
        Self {
            max_uri_length,
            max_header_count,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.max_uri_length, config.max_header_count)
    }
}

impl Middleware for RequestLimits {
    fn name(&self) -> &'static str {
        "request_limits"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn phase(&self) -> Phase {
        Phase::Received
    }

    fn handle(&self, request: &mut RequestContext) -> Flow {
        let uri_length = request.uri.to_string().len();
        if uri_length > self.max_uri_length {
            tracing::warn!(request_id = %request.request_id, uri_length, "URI too long");
            return Flow::Stop(ResponseEntity::status_message(
                request.path(),
                StatusCode::URI_TOO_LONG,
                "URI too long",
            ));
        }

        let header_count = request.headers.len();
        if header_count > self.max_header_count {
            tracing::warn!(request_id = %request.request_id, header_count, "Too many request headers");
            return Flow::Stop(ResponseEntity::status_message(
                request.path(),
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                "Too many request headers",
            ));
        }

        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn status(flow: Flow) -> Option<StatusCode> {
        match flow {
            Flow::Continue => None,
            Flow::Stop(entity) => Some(entity.status),
        }
    }

    #[test]
    fn test_runs_before_matching() {
        assert_eq!(RequestLimits::new(64, 4).phase(), Phase::Received);
    }

    #[test]
    fn test_within_limits_continues() {
        let limits = RequestLimits::new(64, 4);
        let mut req = RequestContext::builder(Method::GET, "/ok").header("a", "1").build();
        assert_eq!(status(limits.handle(&mut req)), None);
    }

    #[test]
    fn test_long_uri_is_414() {
        let limits = RequestLimits::new(16, 4);
        let mut req = RequestContext::builder(Method::GET, "/a/very/long/path/indeed").build();
        assert_eq!(status(limits.handle(&mut req)), Some(StatusCode::URI_TOO_LONG));
    }

    #[test]
    fn test_header_count_is_431() {
        let limits = RequestLimits::new(64, 2);
        let mut req = RequestContext::builder(Method::GET, "/")
            .header("a", "1")
            .header("b", "2")
            .header("c", "3")
            .build();
        assert_eq!(
            status(limits.handle(&mut req)),
            Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
        );
    }
}
