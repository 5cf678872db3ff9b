//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RouteSpec (declared by application code)
//!     → pattern.rs (compile template)
//!     → RouteDescriptor (immutable, with binding plan)
//!     → table.rs (ordered lookup by verb + path)
//!     → Found / MethodNotAllowed / NotFound
//! ```
//!
//! # Design Decisions
//! - Registration is explicit code, not discovered at runtime
//! - Routes are compiled once at startup and only read afterwards
//! - Overlapping templates resolve to the first registration

pub mod pattern;
pub mod route;
pub mod table;

pub use pattern::{PathParams, PathPattern};
pub use route::{RouteDescriptor, RouteSpec};
pub use table::{RouteMatch, RouteTable};
