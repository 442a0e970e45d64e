//! Route guard for protected routes.
//!
//! Reads the session token (Bearer header first, then the session cookie),
//! validates it, enforces the capability declared for the route group, and
//! writes a rotated or cleared session cookie on the way out.
//!
//! # Response
//!
//! - 401 if no token is presented (cookie left alone)
//! - 401 with a clearing `Set-Cookie` if the token is expired or invalid
//! - 403 if the session lacks the route's capability; the handler never runs
//! - Otherwise the handler's response, plus a refreshed `Set-Cookie` when the
//!   session was reissued

use crate::auth::claims::{Role, SessionClaims};
use crate::auth::codec::SessionVerdict;
use crate::auth::cookie::SessionCookie;
use crate::auth::session::{RefreshDecision, SessionValidator};
use crate::errors::GatewayError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// What a route group requires of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Any valid session.
    Authenticated,
    /// A valid session holding exactly this role.
    Role(Role),
}

impl Capability {
    pub fn permits(self, claims: &SessionClaims) -> bool {
        match self {
            Capability::Authenticated => true,
            Capability::Role(role) => claims.role == role,
        }
    }
}

/// State for one guarded route group.
#[derive(Clone)]
pub struct GuardState {
    pub validator: Arc<SessionValidator>,
    pub cookie: SessionCookie,
    pub capability: Capability,
}

/// The validated session, placed in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub claims: SessionClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSession>()
            .cloned()
            .ok_or_else(|| {
                // Route was registered outside a guarded group
                tracing::error!(target: "gw.middleware.guard", "Session extractor used on unguarded route");
                GatewayError::Unauthenticated("Not authenticated".to_string())
            })
    }
}

/// Guard middleware. Install with `from_fn_with_state` as a `route_layer`.
///
/// Any rejected credential clears the session cookie, whichever transport
/// carried it.
#[instrument(skip_all, name = "gw.middleware.guard", fields(capability = ?state.capability))]
pub async fn require_session(
    State(state): State<Arc<GuardState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(raw) = extract_token(req.headers(), &state.cookie) else {
        tracing::debug!(target: "gw.middleware.guard", "No session token presented");
        return GatewayError::Unauthenticated("Not authenticated".to_string()).into_response();
    };

    let validation = state.validator.validate(&raw);

    let claims = match validation.verdict {
        SessionVerdict::Valid(claims) => claims,
        SessionVerdict::Expired => {
            return unauthenticated_clearing_cookie(&state.cookie, "Session expired");
        }
        SessionVerdict::Invalid => {
            return unauthenticated_clearing_cookie(&state.cookie, "Invalid session");
        }
    };

    if !state.capability.permits(&claims) {
        tracing::debug!(
            target: "gw.middleware.guard",
            role = %claims.role,
            "Session lacks required capability"
        );
        return GatewayError::Forbidden("Insufficient permissions".to_string()).into_response();
    }

    req.extensions_mut().insert(AuthenticatedSession { claims });

    let mut response = next.run(req).await;

    if let RefreshDecision::Reissue(credential) = validation.refresh {
        if let Some(value) = state
            .cookie
            .issue(credential.as_str(), state.validator.ttl_seconds())
        {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Bearer token from `Authorization`, falling back to the session cookie.
fn extract_token(headers: &HeaderMap, cookie: &SessionCookie) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .or_else(|| cookie.read(headers))
}

fn unauthenticated_clearing_cookie(cookie: &SessionCookie, message: &str) -> Response {
    let mut response = GatewayError::Unauthenticated(message.to_string()).into_response();
    if let Some(value) = cookie.clear() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::SessionIdentity;
    use crate::auth::codec::TokenCodec;
    use axum::{
        body::Body,
        http::{HeaderValue, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use common::jwt::DEFAULT_CLOCK_SKEW;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const TTL: i64 = 300;

    fn validator() -> Arc<SessionValidator> {
        let codec = TokenCodec::new(&[5u8; 32], "session-key-01", DEFAULT_CLOCK_SKEW).unwrap();
        Arc::new(SessionValidator::new(codec, TTL, 0.2))
    }

    fn token(v: &SessionValidator, role: Role, remaining: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let identity = SessionIdentity {
            sub: "user-1".to_string(),
            role,
            org_id: "org-1".to_string(),
            email: None,
            name: None,
        };
        v.codec()
            .issue_at(&identity, TTL, now + remaining - TTL)
            .unwrap()
            .as_str()
            .to_string()
    }

    fn app(v: Arc<SessionValidator>, capability: Capability, hits: Arc<AtomicUsize>) -> Router {
        let state = Arc::new(GuardState {
            validator: v,
            cookie: SessionCookie::new("vms_session", false),
            capability,
        });
        Router::new()
            .route(
                "/protected",
                get(move |session: AuthenticatedSession| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        session.claims.sub
                    }
                }),
            )
            .route_layer(middleware::from_fn_with_state(state, require_session))
    }

    fn request(header: Option<(&'static str, String)>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/protected");
        if let Some((name, value)) = header {
            builder = builder.header(name, HeaderValue::from_str(&value).unwrap());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_missing_token_is_401_without_cookie() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(validator(), Capability::Authenticated, hits.clone())
            .oneshot(request(None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_token_is_401_and_clears_cookie() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(validator(), Capability::Authenticated, hits.clone())
            .oneshot(request(Some(("cookie", "vms_session=garbage".to_string()))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("vms_session=;"));
        assert!(cookies[0].contains("Max-Age=0"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_401_and_clears_cookie() {
        let v = validator();
        let raw = token(&v, Role::User, -1);
        let response = app(v, Capability::Authenticated, Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Some(("authorization", format!("Bearer {raw}")))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response)[0].contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_rejected_bearer_token_also_clears_cookie() {
        // The cookie is cleared on any rejected credential, whichever
        // transport carried it
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(validator(), Capability::Authenticated, hits.clone())
            .oneshot(request(Some(("authorization", "Bearer garbage".to_string()))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].contains("Max-Age=0"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_cookie_runs_handler_without_refresh() {
        let v = validator();
        let raw = token(&v, Role::User, TTL - 5);
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(v, Capability::Authenticated, hits.clone())
            .oneshot(request(Some(("cookie", format!("vms_session={raw}")))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_near_expiry_appends_refreshed_cookie() {
        let v = validator();
        let raw = token(&v, Role::User, 30);
        let response = app(v, Capability::Authenticated, Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Some(("authorization", format!("Bearer {raw}")))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].starts_with("vms_session=ey"));
        assert!(cookies[0].contains("Max-Age=300"));
    }

    #[tokio::test]
    async fn test_role_mismatch_is_403_and_handler_not_run() {
        let v = validator();
        let raw = token(&v, Role::User, TTL - 5);
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(v, Capability::Role(Role::Admin), hits.clone())
            .oneshot(request(Some(("authorization", format!("Bearer {raw}")))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admin_role_passes_role_guard() {
        let v = validator();
        let raw = token(&v, Role::Admin, TTL - 5);
        let response = app(v, Capability::Role(Role::Admin), Arc::new(AtomicUsize::new(0)))
            .oneshot(request(Some(("authorization", format!("Bearer {raw}")))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_non_bearer_header_falls_back_to_cookie() {
        let cookie = SessionCookie::new("vms_session", false);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        headers.insert(header::COOKIE, HeaderValue::from_static("vms_session=from-cookie"));

        assert_eq!(extract_token(&headers, &cookie).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let cookie = SessionCookie::new("vms_session", false);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("vms_session=from-cookie"));

        assert_eq!(extract_token(&headers, &cookie).as_deref(), Some("from-header"));
    }
}
