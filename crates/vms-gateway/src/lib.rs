//! VMS Gateway Library
//!
//! Backend for the camera-management dashboard. Operators sign in through an
//! external identity provider and read data from remote video-management
//! systems reachable through a cloud relay.
//!
//! The library covers two flows:
//!
//! - Session lifecycle: EdDSA session tokens carried in an HTTP-only cookie,
//!   validated on every protected request and reissued near expiry
//! - Relay proxy: a request for one system's data is resolved to a relay
//!   URL, forwarded, and its answer or failure translated back
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/guard.rs -> handlers/*.rs -> services/*.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Session claims, token codec, refresh policy, cookie
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `extract` - Json/Query extractors rejecting with `GatewayError`
//! - `handlers` - HTTP request handlers
//! - `middleware` - Route guard and HTTP metrics
//! - `models` - Request/response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - System identity, relay and identity provider clients

pub mod auth;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
