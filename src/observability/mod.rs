//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, authenticators, rate limiter produce:
//!     → logging.rs (structured events with request id and route)
//!     → metrics.rs (counters and latency histogram)
//!     → audit.rs (one masked event per audited route)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditEvent, AuditPolicy};
pub use logging::init_logging;
