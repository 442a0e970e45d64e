//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Labels carry no user or system identifiers.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE gw_http_requests_total counter
/// gw_http_requests_total{method="GET",endpoint="/health",status_code="200"} 42
/// ```
#[tracing::instrument(skip_all, name = "gw.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

// A PrometheusHandle can only be installed once per process; the endpoint is
// covered by the integration tests in health_tests.rs.
