//! Global middleware.
//!
//! Middleware runs in one of two phases: `Received` before the route lookup,
//! so it also sees requests that will 404, or `Matched` after a route has
//! matched and before authentication. Within a phase lower priority values
//! run first; equal priorities keep registration order.

use crate::http::{RequestContext, ResponseEntity};

/// Outcome of one middleware.
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Answer with this response and skip the rest of the pipeline.
    Stop(ResponseEntity),
}

/// Where in the pipeline a middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Before route matching.
    Received,
    /// After route matching.
    #[default]
    Matched,
}

pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        100
    }

    fn phase(&self) -> Phase {
        Phase::Matched
    }

    fn handle(&self, request: &mut RequestContext) -> Flow;
}
