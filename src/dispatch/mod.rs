//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → MIDDLEWARE      (received phase: request limits, 414 / 431)
//!     → MATCHING        (route table; 404 / 405)
//!     → MIDDLEWARE      (matched phase; may stop with its own response)
//!     → AUTHENTICATING  (only when the route needs a caller)
//!     → AUDIT CAPTURE   (audited routes only)
//!     → AUTHORIZING     (401 vs 403)
//!     → RATE_CHECK      (429, attempt stays counted)
//!     → BINDING         (400 on bad input)
//!     → INVOKING
//!     → RESPONDING      (2xx clears the rate window; audit event emitted)
//! ```
//!
//! # Design Decisions
//! - Every stage returns `Result<_, DispatchError>`; the error becomes the
//!   JSON envelope
//! - Panics after matching are caught around the route pipeline and keep
//!   the route label; anything earlier is caught at the outermost boundary.
//!   Both become a generic 500

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod middleware;

pub use dispatcher::{DispatchStage, Dispatcher, DispatcherBuilder};
pub use error::{ConfigurationError, DispatchError};
pub use handler::{Handler, HandlerFuture};
pub use middleware::{Flow, Middleware, Phase};
