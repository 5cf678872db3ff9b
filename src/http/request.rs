//! Request handling and transformation.
//!
//! # Responsibilities
//! - Hold the buffered request the dispatcher works on
//! - Resolve the client IP (socket or trusted `X-Forwarded-For`)
//! - Carry the request ID and the authenticated principal between stages
//!
//! # Design Decisions
//! - The body is buffered once; every stage reads the same `Bytes`
//! - Listener-agnostic: anything that can supply method, URI, headers and
//!   body can build a context

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use std::net::SocketAddr;

use crate::auth::Principal;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// One inbound request as seen by the dispatcher.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub remote_addr: Option<SocketAddr>,
    pub client_ip: String,
    pub request_id: String,
    pub principal: Option<Principal>,
}

impl RequestContext {
    pub fn builder(method: Method, uri: &str) -> RequestContextBuilder {
        RequestContextBuilder::new(method, uri)
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> &str {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Value of cookie `name` from the `Cookie` header(s).
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn subject(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.subject())
    }
}

/// Resolve the client IP from the socket, or from `X-Forwarded-For` when trusted.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    remote
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Builder used by the server adapter and by tests.
#[derive(Debug)]
pub struct RequestContextBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
    client_ip: Option<String>,
    request_id: Option<String>,
}

impl RequestContextBuilder {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.parse().unwrap_or_else(|_| Uri::from_static("/")),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: None,
            client_ip: None,
            request_id: None,
        }
    }

    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Append a header. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn build(self) -> RequestContext {
        let client_ip = self
            .client_ip
            .unwrap_or_else(|| client_ip(&self.headers, self.remote_addr, false));
        let request_id = self
            .request_id
            .or_else(|| {
                self.headers
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        RequestContext {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            remote_addr: self.remote_addr,
            client_ip,
            request_id,
            principal: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup() {
        let ctx = RequestContext::builder(Method::GET, "/")
            .header("cookie", "theme=dark; access_token=abc.def.ghi")
            .header("cookie", "other=1")
            .build();
        assert_eq!(ctx.cookie("access_token"), Some("abc.def.ghi"));
        assert_eq!(ctx.cookie("other"), Some("1"));
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn test_query_param_is_decoded() {
        let ctx = RequestContext::builder(Method::GET, "/search?q=hello%20world&page=2").build();
        assert_eq!(ctx.query_param("q").as_deref(), Some("hello world"));
        assert_eq!(ctx.query_param("page").as_deref(), Some("2"));
        assert_eq!(ctx.query_param("nope"), None);
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let remote: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(remote), true), "203.0.113.9");
        assert_eq!(client_ip(&headers, Some(remote), false), "10.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn test_request_id_taken_from_header() {
        let ctx = RequestContext::builder(Method::GET, "/")
            .header(X_REQUEST_ID, "req-1")
            .build();
        assert_eq!(ctx.request_id, "req-1");
    }
}
