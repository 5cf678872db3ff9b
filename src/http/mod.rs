//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum + tower-http layers, body buffering)
//!     → request.rs (RequestContext: client IP, request ID)
//!     → [dispatcher]
//!     → response.rs (entity, envelopes, injected headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{client_ip, RequestContext, RequestContextBuilder, X_FORWARDED_FOR, X_REQUEST_ID};
pub use response::{Reply, ResponseEntity, ResponseHandle};
pub use server::{router, HttpServer};
