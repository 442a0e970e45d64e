//! Relay proxy handlers.
//!
//! Each handler resolves the target system, assembles the outbound query,
//! and wraps the remote body as `{success, systemId, systemName?, data}`.

use crate::errors::GatewayError;
use crate::extract::ApiQuery;
use crate::middleware::AuthenticatedSession;
use crate::models::RelayEnvelope;
use crate::routes::AppState;
use crate::services::relay_client::parse_limit;
use crate::services::{RelayEndpoint, RelayQuery, RelayRequestSpec, SystemIdentity, TimeWindow};
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// `from`/`to` query parameters: epoch milliseconds or RFC 3339.
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<String>,
}

/// Handler for GET /api/cloud/audit-log
#[instrument(skip_all, name = "gw.cloud.audit_log")]
pub async fn audit_log(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    identity: SystemIdentity,
    ApiQuery(params): ApiQuery<WindowParams>,
) -> Result<(StatusCode, Json<RelayEnvelope>), GatewayError> {
    let window = resolve_window(&state, params.from.as_deref(), params.to.as_deref())?;

    let mut query = RelayQuery::new();
    window.apply(&mut query);

    forward(&state, &session, identity, RelayEndpoint::AuditLog, query).await
}

/// Handler for GET /api/cloud/events
#[instrument(skip_all, name = "gw.cloud.events")]
pub async fn events(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    identity: SystemIdentity,
    ApiQuery(params): ApiQuery<EventsParams>,
) -> Result<(StatusCode, Json<RelayEnvelope>), GatewayError> {
    let window = resolve_window(&state, params.from.as_deref(), params.to.as_deref())?;
    let limit = parse_limit(params.limit.as_deref(), state.config.events_default_limit)?;

    let mut query = RelayQuery::new();
    window.apply(&mut query);
    query.set("limit", limit);

    forward(&state, &session, identity, RelayEndpoint::Events, query).await
}

/// Handler for GET /api/nx/storages
#[instrument(skip_all, name = "gw.cloud.storages")]
pub async fn storages(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    identity: SystemIdentity,
) -> Result<(StatusCode, Json<RelayEnvelope>), GatewayError> {
    forward(
        &state,
        &session,
        identity,
        RelayEndpoint::Storages,
        RelayQuery::new(),
    )
    .await
}

fn resolve_window(
    state: &AppState,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<TimeWindow, GatewayError> {
    TimeWindow::resolve(
        from,
        to,
        state.config.relay_default_window_days,
        chrono::Utc::now().timestamp_millis(),
    )
}

async fn forward(
    state: &AppState,
    session: &AuthenticatedSession,
    identity: SystemIdentity,
    endpoint: RelayEndpoint,
    query: RelayQuery,
) -> Result<(StatusCode, Json<RelayEnvelope>), GatewayError> {
    let spec = RelayRequestSpec {
        identity,
        endpoint,
        query,
    };

    let response = state.relay.forward(&spec, &session.claims).await?;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);

    Ok((
        status,
        Json(RelayEnvelope {
            success: true,
            system_id: spec.identity.system_id,
            system_name: spec.identity.system_name,
            data: response.body,
        }),
    ))
}
