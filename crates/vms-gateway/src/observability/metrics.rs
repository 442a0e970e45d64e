//! Metrics definitions for the gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gw_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: ~15 values (parameterized paths)
//! - `status`: 3 values (success, error, timeout), on the duration histogram
//! - `status_code`: the raw HTTP status, on the request counter; bounded by the
//!   codes the router and handlers emit
//! - `outcome`: bounded by code (valid/expired/invalid, success/rejected/...)
//! - `operation`: bounded by the identity provider client's methods
//!
//! System IDs are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gw_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.500, 5.000, 15.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Relay calls cross the public internet and may run up to the 15s timeout
        .set_buckets_for_metric(
            Matcher::Prefix("gw_relay_request".to_string()),
            &[
                0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000, 15.000,
            ],
        )
        .map_err(|e| format!("Failed to set relay request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("gw_idp_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set IdP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metrics:
/// - `gw_http_request_duration_seconds` - labels `method`, `endpoint`, `status`
/// - `gw_http_requests_total` - labels `method`, `endpoint`, `status_code`
///
/// Captures framework-level rejections (404, 405, 415) as well as handler
/// responses.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gw_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("gw_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health"
        | "/metrics"
        | "/api/auth/login"
        | "/api/auth/logout"
        | "/api/auth/session"
        | "/api/auth/me"
        | "/api/users"
        | "/api/delete-user"
        | "/api/cloud/audit-log"
        | "/api/cloud/events"
        | "/api/nx/storages" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

/// Replaces user IDs with a placeholder; anything else becomes `/other`.
fn normalize_dynamic_endpoint(path: &str) -> String {
    // /api/users/{id} → ["", "api", "users", "{id}"]
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() == 4 && path.starts_with("/api/users/") {
        if let Some(id) = parts.get(3) {
            if !id.is_empty() {
                return "/api/users/{id}".to_string();
            }
        }
    }

    "/other".to_string()
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a session token verdict.
///
/// Metric: `gw_session_validations_total`
/// Labels: `outcome` (valid, expired, invalid)
pub fn record_session_validation(outcome: &'static str) {
    counter!("gw_session_validations_total", "outcome" => outcome).increment(1);
}

/// Record a sliding-window reissue.
///
/// Metric: `gw_session_refreshes_total`
pub fn record_session_refresh() {
    counter!("gw_session_refreshes_total").increment(1);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record a relay call.
///
/// Metric: `gw_relay_requests_total`, `gw_relay_request_duration_seconds`
/// Labels: `endpoint` (static relay path), `outcome` (success, rejected,
/// timeout, upstream_unavailable, invalid_response)
pub fn record_relay_request(endpoint: &'static str, outcome: &'static str, duration: Duration) {
    histogram!("gw_relay_request_duration_seconds",
        "endpoint" => endpoint
    )
    .record(duration.as_secs_f64());

    counter!("gw_relay_requests_total",
        "endpoint" => endpoint,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record an identity provider call.
///
/// Metric: `gw_idp_requests_total`, `gw_idp_request_duration_seconds`
/// Labels: `operation`, `outcome`
pub fn record_idp_request(operation: &'static str, outcome: &'static str, duration: Duration) {
    histogram!("gw_idp_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("gw_idp_requests_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
