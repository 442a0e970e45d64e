//! Resolves which remote system (tenant) a request addresses.
//!
//! The system ID is read from the `systemId` query parameter, falling back to
//! the `X-System-Id` header. It is substituted into the relay URL, so only
//! `[A-Za-z0-9_-]` and at most 64 characters are accepted.

use crate::errors::GatewayError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{request::Parts, HeaderMap},
};
use serde::Deserialize;

pub const SYSTEM_ID_HEADER: &str = "x-system-id";
pub const SYSTEM_NAME_HEADER: &str = "x-system-name";

const MAX_SYSTEM_ID_LEN: usize = 64;

/// The remote system a request is routed to. Derived per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemIdentity {
    pub system_id: String,
    pub system_name: Option<String>,
}

/// Query parameters that carry the system identity.
#[derive(Debug, Default, Deserialize)]
pub struct SystemQuery {
    #[serde(rename = "systemId")]
    pub system_id: Option<String>,
    #[serde(rename = "systemName")]
    pub system_name: Option<String>,
}

/// Resolve the system identity from query parameters and headers.
///
/// Query parameters win over headers. Blank values count as absent.
pub fn resolve(query: &SystemQuery, headers: &HeaderMap) -> Result<SystemIdentity, GatewayError> {
    let system_id = non_blank(query.system_id.as_deref())
        .or_else(|| non_blank(header_str(headers, SYSTEM_ID_HEADER)))
        .ok_or_else(|| GatewayError::BadRequest("System ID is required".to_string()))?;

    if !is_valid_system_id(system_id) {
        tracing::debug!(target: "gw.services.identity", len = system_id.len(), "Rejected system ID");
        return Err(GatewayError::BadRequest("Invalid System ID".to_string()));
    }

    let system_name = non_blank(query.system_name.as_deref())
        .or_else(|| non_blank(header_str(headers, SYSTEM_NAME_HEADER)))
        .map(ToString::to_string);

    Ok(SystemIdentity {
        system_id: system_id.to_string(),
        system_name,
    })
}

fn is_valid_system_id(id: &str) -> bool {
    id.len() <= MAX_SYSTEM_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for SystemIdentity
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<SystemQuery>::try_from_uri(&parts.uri).map_err(|e| {
            tracing::debug!(target: "gw.services.identity", error = %e, "Unparseable query string");
            GatewayError::BadRequest("Invalid query string".to_string())
        })?;

        resolve(&query, &parts.headers)
    }
}
