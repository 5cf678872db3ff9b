//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → limits.rs (URI length, header count)
//!     → [authentication, see crate::auth]
//!     → authorization.rs (role / permission checks against roles.rs)
//!     → rate_limit.rs (per-key attempt window)
//!     → Pass to parameter binding
//!
//! Credentials:
//!     tokens.rs issues and validates access/refresh tokens
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown roles hold no permissions
//! - Missing credentials (401) are reported apart from missing privilege (403)
//! - No trust in client input

pub mod authorization;
pub mod limits;
pub mod rate_limit;
pub mod roles;
pub mod tokens;

pub use authorization::{authorize, AccessRequirements};
pub use limits::RequestLimits;
pub use rate_limit::{RateKey, RateKeySource, RateLimitPolicy, RateLimiter};
pub use roles::{Role, RoleDefinition, RoleGraph, RoleGraphBuilder};
pub use tokens::{Claims, TokenError, TokenKind, TokenService};
