//! User directory handlers.
//!
//! Every call is scoped to the caller's organization. Role requirements are
//! declared on the route groups in `routes`; the checks here are about which
//! record the caller is touching.

use crate::errors::GatewayError;
use crate::extract::ApiJson;
use crate::middleware::AuthenticatedSession;
use crate::models::{DeleteUserRequest, SuccessResponse, UserResponse, UsersResponse};
use crate::routes::AppState;
use crate::services::{IdpUser, UserUpdate};
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/users
#[instrument(skip_all, name = "gw.users.list")]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
) -> Result<Json<UsersResponse<IdpUser>>, GatewayError> {
    let users = state.idp.list_users(&session.claims.org_id).await?;

    Ok(Json(UsersResponse {
        success: true,
        users,
    }))
}

/// Handler for GET /api/users/:id
#[instrument(skip_all, name = "gw.users.get")]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse<IdpUser>>, GatewayError> {
    let user = state
        .idp
        .get_user(&user_id, &session.claims.org_id)
        .await?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// Handler for PUT /api/users/:id
///
/// Non-admins may update only their own record and may not change roles.
#[instrument(skip_all, name = "gw.users.update")]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    Path(user_id): Path<String>,
    ApiJson(update): ApiJson<UserUpdate>,
) -> Result<Json<UserResponse<IdpUser>>, GatewayError> {
    let claims = &session.claims;

    if !claims.is_admin() {
        if user_id != claims.sub {
            return Err(GatewayError::Forbidden(
                "You can only update your own profile".to_string(),
            ));
        }
        if update.role.is_some() {
            return Err(GatewayError::Forbidden(
                "Only administrators can change roles".to_string(),
            ));
        }
    }

    let user = state
        .idp
        .update_user(&user_id, &claims.org_id, &update)
        .await?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// Handler for DELETE /api/users/:id (admin route group)
#[instrument(skip_all, name = "gw.users.delete")]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    Path(user_id): Path<String>,
) -> Result<Json<SuccessResponse>, GatewayError> {
    remove_user(&state, &session, &user_id).await
}

/// Handler for POST /api/delete-user (admin route group)
#[instrument(skip_all, name = "gw.users.delete")]
pub async fn delete_user_by_body(
    State(state): State<Arc<AppState>>,
    session: AuthenticatedSession,
    ApiJson(request): ApiJson<DeleteUserRequest>,
) -> Result<Json<SuccessResponse>, GatewayError> {
    remove_user(&state, &session, request.user_id.trim()).await
}

async fn remove_user(
    state: &AppState,
    session: &AuthenticatedSession,
    user_id: &str,
) -> Result<Json<SuccessResponse>, GatewayError> {
    if user_id.is_empty() {
        return Err(GatewayError::BadRequest("User ID is required".to_string()));
    }
    if user_id == session.claims.sub {
        return Err(GatewayError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    state
        .idp
        .delete_user(user_id, &session.claims.org_id)
        .await?;

    tracing::info!(target: "gw.users", "User deleted");
    Ok(Json(SuccessResponse::with_message("User deleted")))
}
