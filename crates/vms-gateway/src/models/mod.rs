//! Request and response bodies of the gateway's HTTP API.
//!
//! Field names are camelCase on the wire to match the dashboard client.

use crate::auth::claims::{Role, SessionClaims};
use common::secret::SecretString;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

/// Body of `POST /api/delete-user`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    pub user_id: String,
}

/// The signed-in user as described by the session token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    pub organization_id: String,
}

impl From<&SessionClaims> for SessionUser {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            role: claims.role,
            organization_id: claims.org_id.clone(),
        }
    }
}

/// Response of the login and session endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse<U> {
    pub success: bool,
    pub is_authenticated: bool,
    pub user: U,
}

impl<U> AuthResponse<U> {
    pub fn authenticated(user: U) -> Self {
        Self {
            success: true,
            is_authenticated: true,
            user,
        }
    }
}

/// Generic success acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Wraps a single payload under a named key with `success: true`.
#[derive(Debug, Serialize)]
pub struct UserResponse<U> {
    pub success: bool,
    pub user: U,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse<U> {
    pub success: bool,
    pub users: Vec<U>,
}

/// Envelope for a successful relay call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    pub success: bool,
    pub system_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_name: Option<String>,
    pub data: serde_json::Value,
}
