//! Session handlers: login, logout, session probe, and profile.

use crate::errors::GatewayError;
use crate::extract::ApiJson;
use crate::middleware::AuthenticatedSession;
use crate::models::{AuthResponse, LoginRequest, SessionUser, SuccessResponse, UserResponse};
use crate::routes::AppState;
use crate::services::IdpUser;
use axum::{
    extract::State,
    http::header,
    response::{AppendHeaders, IntoResponse},
    Json,
};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/auth/login
///
/// Authenticates against the identity provider, issues a session token, and
/// sets it as the session cookie.
#[instrument(skip_all, name = "gw.auth.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.expose_secret().is_empty() {
        return Err(GatewayError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let user = state.idp.login(email, &request.password).await?;

    let credential = state.sessions.issue(&user.session_identity()).map_err(|e| {
        tracing::error!(target: "gw.auth.login", error = %e, "Failed to issue session token");
        GatewayError::Internal
    })?;
    let cookie = state
        .cookie
        .issue(credential.as_str(), state.sessions.ttl_seconds())
        .ok_or(GatewayError::Internal)?;

    tracing::info!(target: "gw.auth.login", role = %user.role, "Operator signed in");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(AuthResponse::<IdpUser>::authenticated(user)),
    ))
}

/// Handler for POST /api/auth/logout
///
/// Always clears the cookie, whether or not a session was presented.
#[instrument(skip_all, name = "gw.auth.logout")]
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, GatewayError> {
    let cookie = state.cookie.clear().ok_or(GatewayError::Internal)?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(SuccessResponse::with_message("Logged out")),
    ))
}

/// Handler for GET /api/auth/session
///
/// Reports the session described by the validated token. A refreshed cookie,
/// if any, is added by the guard.
#[instrument(skip_all, name = "gw.auth.session")]
pub async fn session(session: AuthenticatedSession) -> Json<AuthResponse<SessionUser>> {
    Json(AuthResponse::authenticated(SessionUser::from(&session.claims)))
}

/// Handler for GET /api/auth/me
///
/// Full profile from the identity provider.
#[instrument(skip_all, name = "gw.auth.me")]
pub async fn me(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
) -> Result<Json<UserResponse<IdpUser>>, GatewayError> {
    let claims = &session.claims;
    let user = state.idp.get_profile(&claims.sub, &claims.org_id).await?;

    if user.organization_id != claims.org_id {
        tracing::warn!(target: "gw.auth.me", "Profile organization does not match session");
        return Err(GatewayError::Forbidden("Insufficient permissions".to_string()));
    }

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}
