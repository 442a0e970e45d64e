//! Identity provider HTTP client.
//!
//! The identity provider authenticates operators and stores their profiles.
//! Every user-directory call is scoped to the caller's organization.
//!
//! # Security
//!
//! - The gateway authenticates with its own API key
//! - Passwords are held as `SecretString` and never logged
//! - User IDs are percent-encoded as single path segments
//! - Errors are logged server-side with generic messages returned

use crate::auth::claims::{Role, SessionIdentity};
use crate::config::Config;
use crate::errors::GatewayError;
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

const OP_LOGIN: &str = "login";

/// A user record as stored by the identity provider.
///
/// Fields the gateway does not interpret are kept in `profile` and passed
/// through to the dashboard unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    pub organization_id: String,
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl IdpUser {
    /// Identity placed in a newly issued session token.
    pub fn session_identity(&self) -> SessionIdentity {
        SessionIdentity {
            sub: self.id.clone(),
            role: self.role,
            org_id: self.organization_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    user: IdpUser,
}

/// Fields a caller may change on a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// HTTP client for the identity provider.
#[derive(Clone)]
pub struct IdpClient {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
}

impl IdpClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the base URL does not parse or
    /// the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            error!(target: "gw.services.idp", error = %e, "Invalid identity provider URL");
            GatewayError::Internal
        })?;
        if base_url.cannot_be_a_base() {
            error!(target: "gw.services.idp", "Identity provider URL cannot be a base");
            return Err(GatewayError::Internal);
        }

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "gw.services.idp", error = %e, "Failed to build HTTP client");
                GatewayError::Internal
            })?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::new(
            &config.idp_base_url,
            config.idp_api_key.clone(),
            Duration::from_secs(config.idp_timeout_seconds),
        )
    }

    /// Authenticate an operator by email and password.
    ///
    /// # Errors
    ///
    /// - `GatewayError::Unauthenticated` if the credentials are rejected
    /// - `GatewayError::UpstreamUnavailable` / `UpstreamTimeout` on provider failure
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<IdpUser, GatewayError> {
        let url = self.url(&["api", "auth", "login"])?;
        let body = serde_json::json!({
            "email": email,
            "password": password.expose_secret(),
        });

        let response: LoginResponse = self
            .call(OP_LOGIN, self.client.post(url).json(&body))
            .await?;
        Ok(response.user)
    }

    /// Full profile of the signed-in user.
    #[instrument(skip_all)]
    pub async fn get_profile(&self, user_id: &str, org_id: &str) -> Result<IdpUser, GatewayError> {
        let url = self.url(&["api", "users", user_id])?;
        self.call(
            "get_profile",
            self.client.get(url).query(&[("organizationId", org_id)]),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn list_users(&self, org_id: &str) -> Result<Vec<IdpUser>, GatewayError> {
        let url = self.url(&["api", "users"])?;
        self.call(
            "list_users",
            self.client.get(url).query(&[("organizationId", org_id)]),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn get_user(&self, user_id: &str, org_id: &str) -> Result<IdpUser, GatewayError> {
        let url = self.url(&["api", "users", user_id])?;
        self.call(
            "get_user",
            self.client.get(url).query(&[("organizationId", org_id)]),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn update_user(
        &self,
        user_id: &str,
        org_id: &str,
        update: &UserUpdate,
    ) -> Result<IdpUser, GatewayError> {
        let url = self.url(&["api", "users", user_id])?;
        self.call(
            "update_user",
            self.client
                .put(url)
                .query(&[("organizationId", org_id)])
                .json(update),
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn delete_user(&self, user_id: &str, org_id: &str) -> Result<(), GatewayError> {
        let url = self.url(&["api", "users", user_id])?;
        let start = Instant::now();
        let result = self
            .send(
                "delete_user",
                self.client
                    .delete(url)
                    .query(&[("organizationId", org_id)]),
            )
            .await
            .map(|_| ());
        metrics::record_idp_request("delete_user", outcome(&result), start.elapsed());
        result
    }

    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Internal)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let start = Instant::now();
        let result = match self.send(operation, request).await {
            Ok(bytes) => serde_json::from_slice::<T>(&bytes).map_err(|e| {
                warn!(target: "gw.services.idp", operation, error = %e, "Unparseable identity provider response");
                GatewayError::UpstreamUnavailable(format!("invalid {} response", operation))
            }),
            Err(e) => Err(e),
        };
        metrics::record_idp_request(operation, outcome(&result), start.elapsed());
        result
    }

    async fn send(
        &self,
        operation: &'static str,
        mut request: RequestBuilder,
    ) -> Result<Vec<u8>, GatewayError> {
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| transport_error(operation, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(map_status(operation, status));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| transport_error(operation, &e))
    }
}

fn transport_error(operation: &'static str, e: &reqwest::Error) -> GatewayError {
    warn!(target: "gw.services.idp", operation, error = %e, "Identity provider request failed");
    if e.is_timeout() {
        GatewayError::UpstreamTimeout(format!("identity provider {}", operation))
    } else {
        GatewayError::UpstreamUnavailable(format!("identity provider {}: {}", operation, e))
    }
}

fn map_status(operation: &'static str, status: StatusCode) -> GatewayError {
    match status.as_u16() {
        400 | 401 if operation == OP_LOGIN => {
            GatewayError::Unauthenticated("Invalid email or password".to_string())
        }
        400 => GatewayError::BadRequest("Invalid request".to_string()),
        401 => {
            error!(target: "gw.services.idp", "Gateway API key rejected by identity provider");
            GatewayError::Internal
        }
        403 => GatewayError::Forbidden("Request denied by identity provider".to_string()),
        404 => GatewayError::NotFound("User not found".to_string()),
        500..=599 => {
            warn!(target: "gw.services.idp", operation, status = %status, "Identity provider returned server error");
            GatewayError::UpstreamUnavailable(format!("identity provider {} returned {}", operation, status))
        }
        other => {
            warn!(target: "gw.services.idp", operation, status = %status, "Unexpected identity provider response");
            GatewayError::UpstreamRejected {
                status: other,
                details: None,
            }
        }
    }
}

fn outcome<T>(result: &Result<T, GatewayError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(GatewayError::UpstreamTimeout(_)) => "timeout",
        Err(GatewayError::UpstreamUnavailable(_)) => "upstream_unavailable",
        Err(GatewayError::Internal) => "error",
        Err(_) => "rejected",
    }
}
