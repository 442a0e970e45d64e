//! HTTP middleware for the gateway.
//!
//! # Components
//!
//! - `guard` - session validation and per-route-group capability checks
//! - `http_metrics` - request metrics for every response

pub mod guard;
pub mod http_metrics;

pub use guard::{require_session, AuthenticatedSession, Capability, GuardState};
pub use http_metrics::http_metrics_middleware;
