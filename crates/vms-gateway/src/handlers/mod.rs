//! HTTP request handlers for the gateway.

pub mod auth;
pub mod cloud;
pub mod health;
pub mod metrics;
pub mod users;

pub use health::health_check;
pub use metrics::metrics_handler;
