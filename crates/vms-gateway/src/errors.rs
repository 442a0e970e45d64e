//! Gateway error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Upstream failures are logged server-side with detail and surfaced to
//! clients with generic messages.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Generic message for relay and identity provider failures.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "System temporarily unavailable";

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - Unauthenticated: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - UpstreamUnavailable: 502 Bad Gateway
/// - UpstreamTimeout: 504 Gateway Timeout
/// - UpstreamRejected: the remote status, passed through
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection, DNS, send, or body-read failure. The detail is logged only.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Remote answered with a non-2xx status.
    ///
    /// `details` carries the remote JSON body for 4xx answers only.
    #[error("Upstream rejected request with status {status}")]
    UpstreamRejected {
        status: u16,
        details: Option<serde_json::Value>,
    },

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Unauthenticated(_) => 401,
            GatewayError::Forbidden(_) => 403,
            GatewayError::BadRequest(_) => 400,
            GatewayError::NotFound(_) => 404,
            GatewayError::UpstreamUnavailable(_) => 502,
            GatewayError::UpstreamTimeout(_) => 504,
            GatewayError::UpstreamRejected { status, .. } => {
                if (400..=599).contains(status) {
                    *status
                } else {
                    502
                }
            }
            GatewayError::Internal => 500,
        }
    }

    /// Machine-readable error code placed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Unauthenticated(_) => "UNAUTHENTICATED",
            GatewayError::Forbidden(_) => "FORBIDDEN",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            GatewayError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            GatewayError::UpstreamRejected { .. } => "UPSTREAM_REJECTED",
            GatewayError::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_authenticated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        let code = self.code();

        let (message, details) = match self {
            GatewayError::Unauthenticated(reason)
            | GatewayError::Forbidden(reason)
            | GatewayError::BadRequest(reason)
            | GatewayError::NotFound(reason) => (reason, None),
            GatewayError::UpstreamUnavailable(reason) => {
                tracing::warn!(target: "gw.upstream", reason = %reason, "Upstream unavailable");
                (UPSTREAM_FAILURE_MESSAGE.to_string(), None)
            }
            GatewayError::UpstreamTimeout(reason) => {
                tracing::warn!(target: "gw.upstream", reason = %reason, "Upstream timed out");
                (UPSTREAM_FAILURE_MESSAGE.to_string(), None)
            }
            GatewayError::UpstreamRejected { status, details } => {
                tracing::info!(target: "gw.upstream", status, "Upstream rejected request");
                let message = if status >= 500 {
                    UPSTREAM_FAILURE_MESSAGE.to_string()
                } else {
                    "Remote system rejected the request".to_string()
                };
                (message, details)
            }
            GatewayError::Internal => ("An internal error occurred".to_string(), None),
        };

        let unauthorized = status == StatusCode::UNAUTHORIZED;
        let body = ErrorResponse {
            success: false,
            error: message,
            code,
            is_authenticated: unauthorized.then_some(false),
            details,
        };

        let mut response = (status, Json(body)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if unauthorized {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"vms-gateway\", error=\"invalid_token\""),
            );
        }

        response
    }
}
