//! Cloud relay HTTP client.
//!
//! Forwards read requests to a tenant's remote VMS through the cloud relay.
//! The relay base URL is a template with a `{systemId}` placeholder.
//!
//! # Behavior
//!
//! - No automatic retries; every call has a bounded timeout
//! - Redirects are not followed; a 3xx answer is a rejection
//! - Remote bodies are passed through verbatim; nothing is synthesized

use crate::auth::claims::SessionClaims;
use crate::config::{Config, MAX_EVENTS_LIMIT, SYSTEM_ID_PLACEHOLDER};
use crate::errors::GatewayError;
use crate::observability::metrics;
use crate::services::identity::SystemIdentity;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{header, redirect, Client, StatusCode};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Connect timeout for relay requests.
const RELAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub const RELAY_SYSTEM_ID_HEADER: &str = "X-Relay-System-Id";
pub const RELAY_TENANT_HEADER: &str = "X-Relay-Tenant";

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Remote endpoints reachable through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEndpoint {
    AuditLog,
    Events,
    Storages,
}

impl RelayEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            RelayEndpoint::AuditLog => "/rest/v3/servers/this/auditLog",
            RelayEndpoint::Events => "/rest/v3/events/log",
            RelayEndpoint::Storages => "/rest/v3/servers/this/storages",
        }
    }

    /// Metric and log label.
    pub fn label(self) -> &'static str {
        match self {
            RelayEndpoint::AuditLog => "audit_log",
            RelayEndpoint::Events => "events",
            RelayEndpoint::Storages => "storages",
        }
    }
}

/// Outbound query parameters. Setting a key again replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayQuery {
    params: BTreeMap<String, String>,
}

impl RelayQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// One outbound relay call.
#[derive(Debug, Clone)]
pub struct RelayRequestSpec {
    pub identity: SystemIdentity,
    pub endpoint: RelayEndpoint,
    pub query: RelayQuery,
}

/// A successful (2xx) remote answer.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum RelayError {
    /// Connect, DNS, send, or body-read failure.
    #[error("relay unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("relay request timed out")]
    Timeout,

    /// Remote answered with a non-2xx status. `body` is kept for 4xx JSON only.
    #[error("relay rejected request with status {status}")]
    Rejected {
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// Remote answered 2xx with a body that is not JSON.
    #[error("relay returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl RelayError {
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::UpstreamUnavailable(_) => "upstream_unavailable",
            RelayError::Timeout => "timeout",
            RelayError::Rejected { .. } => "rejected",
            RelayError::InvalidResponse(_) => "invalid_response",
        }
    }

    fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            RelayError::Timeout
        } else {
            RelayError::UpstreamUnavailable(e.to_string())
        }
    }
}

impl From<RelayError> for GatewayError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::UpstreamUnavailable(detail) => GatewayError::UpstreamUnavailable(detail),
            RelayError::Timeout => GatewayError::UpstreamTimeout("relay".to_string()),
            RelayError::Rejected { status, body } => GatewayError::UpstreamRejected {
                status,
                details: body,
            },
            RelayError::InvalidResponse(detail) => GatewayError::UpstreamUnavailable(format!(
                "invalid relay response: {}",
                detail
            )),
        }
    }
}

/// HTTP client for the cloud relay.
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    url_template: String,
    api_token: Option<SecretString>,
}

impl RelayClient {
    /// Create a new relay client.
    ///
    /// # Arguments
    ///
    /// * `url_template` - Base URL containing `{systemId}`
    /// * `api_token` - Bearer token presented to the relay, if any
    /// * `timeout` - Total per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the HTTP client cannot be built.
    pub fn new(
        url_template: String,
        api_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(RELAY_CONNECT_TIMEOUT.min(timeout))
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| {
                error!(target: "gw.services.relay", error = %e, "Failed to build HTTP client");
                GatewayError::Internal
            })?;

        Ok(Self {
            client,
            url_template,
            api_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            config.relay_url_template.clone(),
            config.relay_api_token.clone(),
            Duration::from_secs(config.relay_timeout_seconds),
        )
    }

    /// Full URL (without query) for `endpoint` on `system_id`.
    pub fn url_for(&self, system_id: &str, endpoint: RelayEndpoint) -> String {
        format!(
            "{}{}",
            self.url_template.replace(SYSTEM_ID_PLACEHOLDER, system_id),
            endpoint.path()
        )
    }

    /// Issue the call described by `spec` on behalf of `claims`.
    ///
    /// # Errors
    ///
    /// Every failure is a `RelayError`; see [`RelayError::kind`].
    #[instrument(
        skip(self, spec, claims),
        fields(endpoint = spec.endpoint.label(), system_id = %spec.identity.system_id)
    )]
    pub async fn forward(
        &self,
        spec: &RelayRequestSpec,
        claims: &SessionClaims,
    ) -> Result<RelayResponse, RelayError> {
        let url = self.url_for(&spec.identity.system_id, spec.endpoint);

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(RELAY_SYSTEM_ID_HEADER, spec.identity.system_id.as_str())
            .header(RELAY_TENANT_HEADER, claims.org_id.as_str());
        if !spec.query.is_empty() {
            request = request.query(&spec.query.params);
        }
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let start = Instant::now();
        let result = self.execute(request).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_relay_request(spec.endpoint.label(), outcome, start.elapsed());

        match &result {
            Ok(response) => {
                debug!(target: "gw.services.relay", status = response.status, "Relay call succeeded")
            }
            Err(e) => warn!(target: "gw.services.relay", error = %e, kind = e.kind(), "Relay call failed"),
        }

        result
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<RelayResponse, RelayError> {
        let response = request
            .send()
            .await
            .map_err(|e| RelayError::from_transport(&e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::from_transport(&e))?;

        if status.is_success() {
            let body = if status == StatusCode::NO_CONTENT && bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .map_err(|e| RelayError::InvalidResponse(e.to_string()))?
            };
            return Ok(RelayResponse {
                status: status.as_u16(),
                body,
            });
        }

        let body = if status.is_client_error() {
            serde_json::from_slice(&bytes).ok()
        } else {
            None
        };

        Err(RelayError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Inclusive time window forwarded as epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from_ms: i64,
    pub to_ms: i64,
}

impl TimeWindow {
    /// Resolve `from`/`to` parameters against `now_ms`.
    ///
    /// `to` defaults to now and `from` to `default_days` before now.
    ///
    /// # Errors
    ///
    /// `BadRequest` if either value is unparseable or `from > to`.
    pub fn resolve(
        from: Option<&str>,
        to: Option<&str>,
        default_days: i64,
        now_ms: i64,
    ) -> Result<Self, GatewayError> {
        let to_ms = match non_blank(to) {
            Some(raw) => parse_time_param("to", raw)?,
            None => now_ms,
        };
        let from_ms = match non_blank(from) {
            Some(raw) => parse_time_param("from", raw)?,
            None => now_ms.saturating_sub(default_days.saturating_mul(MILLIS_PER_DAY)),
        };

        if from_ms > to_ms {
            return Err(GatewayError::BadRequest(
                "'from' must not be after 'to'".to_string(),
            ));
        }

        Ok(Self { from_ms, to_ms })
    }

    /// Write `from` and `to` into `query`.
    pub fn apply(&self, query: &mut RelayQuery) {
        query.set("from", self.from_ms).set("to", self.to_ms);
    }
}

/// Parse epoch milliseconds or an RFC 3339 timestamp.
pub fn parse_time_param(name: &str, raw: &str) -> Result<i64, GatewayError> {
    let invalid = || {
        GatewayError::BadRequest(format!(
            "'{}' must be epoch milliseconds or an RFC 3339 timestamp",
            name
        ))
    };

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().map_err(|_| invalid());
    }

    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|_| invalid())
}

/// Parse the events `limit`, defaulting to `default`.
pub fn parse_limit(raw: Option<&str>, default: u32) -> Result<u32, GatewayError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(default);
    };

    raw.parse::<u32>()
        .ok()
        .filter(|limit| (1..=MAX_EVENTS_LIMIT).contains(limit))
        .ok_or_else(|| {
            GatewayError::BadRequest(format!("'limit' must be between 1 and {}", MAX_EVENTS_LIMIT))
        })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
