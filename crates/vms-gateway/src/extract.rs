//! Request extractors that reject with `GatewayError`.
//!
//! axum's own `Json` and `Query` rejections are plain text and echo serde
//! detail. These wrappers log that detail and answer with the standard error
//! body instead.

use crate::errors::GatewayError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

/// JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!(
                target: "gw.extract",
                status = %rejection.status(),
                error = %rejection.body_text(),
                "Rejected request body"
            );
            GatewayError::BadRequest("Invalid request body".to_string())
        })?;
        Ok(Self(value))
    }
}

/// Query string parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri).map_err(|rejection| {
            tracing::debug!(
                target: "gw.extract",
                error = %rejection.body_text(),
                "Rejected query string"
            );
            GatewayError::BadRequest("Invalid query string".to_string())
        })?;
        Ok(Self(value))
    }
}
