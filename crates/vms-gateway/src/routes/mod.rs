//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state. Protected routes are
//! grouped by the capability they require; each group carries its own guard.

use crate::auth::claims::Role;
use crate::auth::codec::CodecError;
use crate::auth::cookie::SessionCookie;
use crate::auth::session::SessionValidator;
use crate::config::{Config, REQUEST_TIMEOUT_SECONDS};
use crate::errors::GatewayError;
use crate::handlers::{self, auth, cloud, users};
use crate::middleware::{http_metrics_middleware, require_session, Capability, GuardState};
use crate::services::{IdpClient, RelayClient};
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Session token validation and issuance.
    pub sessions: Arc<SessionValidator>,

    /// Session cookie attributes.
    pub cookie: SessionCookie,

    /// Cloud relay client.
    pub relay: RelayClient,

    /// Identity provider client.
    pub idp: IdpClient,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to initialize session codec: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to initialize upstream client: {0}")]
    Client(#[from] GatewayError),
}

impl AppState {
    /// Build state from configuration.
    pub fn from_config(config: Config) -> Result<Self, StateError> {
        let sessions = Arc::new(SessionValidator::from_config(&config)?);
        let cookie = SessionCookie::new(
            config.session_cookie_name.clone(),
            config.environment.is_production(),
        );
        let relay = RelayClient::from_config(&config)?;
        let idp = IdpClient::from_config(&config)?;

        Ok(Self {
            config,
            sessions,
            cookie,
            relay,
            idp,
        })
    }

    fn guard(&self, capability: Capability) -> Arc<GuardState> {
        Arc::new(GuardState {
            validator: self.sessions.clone(),
            cookie: self.cookie.clone(),
            capability,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK") - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/auth/login`, `/api/auth/logout` - public
/// - `/api/auth/session`, `/api/auth/me` - authenticated
/// - `/api/users`, `/api/users/:id` (GET, PUT) - authenticated
/// - `/api/users/:id` (DELETE), `/api/delete-user` - admin
/// - `/api/cloud/audit-log`, `/api/cloud/events`, `/api/nx/storages` - authenticated
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let authenticated = state.guard(Capability::Authenticated);
    let admin = state.guard(Capability::Role(Role::Admin));

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Any valid session
    let session_routes = Router::new()
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", get(users::list_users))
        .route(
            "/api/users/:id",
            get(users::get_user).put(users::update_user),
        )
        .route("/api/cloud/audit-log", get(cloud::audit_log))
        .route("/api/cloud/events", get(cloud::events))
        .route("/api/nx/storages", get(cloud::storages))
        .route_layer(middleware::from_fn_with_state(
            authenticated,
            require_session,
        ))
        .with_state(state.clone());

    // Admin role
    let admin_routes = Router::new()
        .route("/api/users/:id", delete(users::delete_user))
        .route("/api/delete-user", post(users::delete_user_by_body))
        .route_layer(middleware::from_fn_with_state(admin, require_session))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }
}
