//! HTTP metrics middleware.
//!
//! Applied as the outermost layer so that framework-level rejections that
//! occur before any handler runs are recorded too:
//! - 415 Unsupported Media Type (wrong Content-Type)
//! - 400 Bad Request (JSON parse errors)
//! - 404 Not Found
//! - 405 Method Not Allowed

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Records method, normalized path, status code, and duration for every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_502() -> (StatusCode, &'static str) {
        (StatusCode::BAD_GATEWAY, "Error")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/health", get(handler_200))
            .route("/api/nx/storages", get(handler_502))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn get_status(uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("request builder should succeed");

        test_app()
            .oneshot(request)
            .await
            .expect("request should succeed")
            .status()
    }

    #[tokio::test]
    async fn test_middleware_passes_success_through() {
        assert_eq!(get_status("/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_passes_error_through() {
        assert_eq!(get_status("/api/nx/storages").await, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_middleware_sees_router_not_found() {
        assert_eq!(get_status("/nonexistent").await, StatusCode::NOT_FOUND);
    }
}
