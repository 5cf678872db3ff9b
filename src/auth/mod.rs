//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (route requires a caller):
//!     → authenticator.rs (resolver walks accepted schemes)
//!     → bearer.rs / basic.rs (token or credential check)
//!     → Principal attached to the RequestContext
//!
//! Login / logout handlers:
//!     → cookies.rs (Set-Cookie for access/refresh tokens)
//! ```
//!
//! # Design Decisions
//! - Strategies are trait objects registered at startup; adding one does not
//!   touch the dispatcher
//! - Tokens are bound to client IP and user-agent

pub mod authenticator;
pub mod basic;
pub mod bearer;
pub mod cookies;
pub mod identity;

pub use authenticator::{AuthResolver, AuthScheme, Authenticator, Principal};
pub use basic::BasicAuthenticator;
pub use bearer::{BearerAuthenticator, CookieAuthenticator, ACCESS_COOKIE, REFRESH_COOKIE};
pub use cookies::AuthCookies;
pub use identity::{CredentialVerifier, Identity, IdentityProvider};
