//! Test server harness for E2E testing
//!
//! Provides `TestGatewayServer` for spawning real gateway instances in tests.
//! Each server gets its own mock relay and mock identity provider.

use crate::crypto_fixtures::server_signing_key_b64;
use crate::token_builders::TEST_SESSION_TTL_SECONDS;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use vms_gateway::config::Config;
use vms_gateway::observability::metrics::init_metrics_recorder;
use vms_gateway::routes::{self, AppState};
use wiremock::MockServer;

/// Process-wide metrics handle shared by every test server.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Handle of the globally installed recorder.
///
/// The recorder can only be installed once per process, so all servers in one
/// test binary share it and counters accumulate across tests. If another
/// recorder was installed first, the returned handle is detached and renders
/// nothing.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Path prefix the mock relay serves each system under.
pub const RELAY_SYSTEM_PREFIX: &str = "/systems";

/// Test harness for spawning the gateway in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestGatewayServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGatewayServer {
    addr: SocketAddr,
    config: Config,
    relay: MockServer,
    idp: MockServer,
    _handle: JoinHandle<()>,
}

/// Settings a test may override before spawning.
#[derive(Debug, Clone)]
pub struct TestGatewayBuilder {
    session_ttl_seconds: i64,
    refresh_threshold: f64,
    relay_timeout_seconds: u64,
    relay_api_token: Option<String>,
    relay_url_template: Option<String>,
}

impl Default for TestGatewayBuilder {
    fn default() -> Self {
        Self {
            session_ttl_seconds: TEST_SESSION_TTL_SECONDS,
            refresh_threshold: 0.2,
            relay_timeout_seconds: 2,
            relay_api_token: Some("test-relay-token".to_string()),
            relay_url_template: None,
        }
    }
}

impl TestGatewayBuilder {
    pub fn session_ttl(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    pub fn refresh_threshold(mut self, threshold: f64) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    pub fn relay_timeout(mut self, seconds: u64) -> Self {
        self.relay_timeout_seconds = seconds;
        self
    }

    /// Point the gateway at `template` instead of the mock relay.
    pub fn relay_url_template(mut self, template: impl Into<String>) -> Self {
        self.relay_url_template = Some(template.into());
        self
    }

    /// Spawn the server.
    ///
    /// The server will:
    /// - Start a mock relay and a mock identity provider
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn(self) -> Result<TestGatewayServer, anyhow::Error> {
        let relay = MockServer::start().await;
        let idp = MockServer::start().await;

        let relay_url_template = self
            .relay_url_template
            .unwrap_or_else(|| format!("{}{}/{{systemId}}", relay.uri(), RELAY_SYSTEM_PREFIX));

        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("APP_ENV".to_string(), "test".to_string()),
            ("SESSION_SIGNING_KEY".to_string(), server_signing_key_b64()),
            (
                "SESSION_TTL_SECONDS".to_string(),
                self.session_ttl_seconds.to_string(),
            ),
            (
                "SESSION_REFRESH_THRESHOLD".to_string(),
                self.refresh_threshold.to_string(),
            ),
            ("IDP_BASE_URL".to_string(), idp.uri()),
            ("IDP_API_KEY".to_string(), "test-idp-key".to_string()),
            ("RELAY_URL_TEMPLATE".to_string(), relay_url_template),
            (
                "RELAY_TIMEOUT_SECONDS".to_string(),
                self.relay_timeout_seconds.to_string(),
            ),
        ]);
        if let Some(token) = self.relay_api_token {
            vars.insert("RELAY_API_TOKEN".to_string(), token);
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(
            AppState::from_config(config.clone())
                .map_err(|e| anyhow::anyhow!("Failed to create app state: {}", e))?,
        );

        // Build routes using the gateway's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(TestGatewayServer {
            addr,
            config,
            relay,
            idp,
            _handle: handle,
        })
    }
}

impl TestGatewayServer {
    /// Spawn a server with default test settings.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        TestGatewayBuilder::default().spawn().await
    }

    /// Start from default test settings.
    pub fn builder() -> TestGatewayBuilder {
        TestGatewayBuilder::default()
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mock relay. Requests for system `X` arrive under `/systems/X`.
    pub fn relay(&self) -> &MockServer {
        &self.relay
    }

    /// Mock identity provider.
    pub fn idp(&self) -> &MockServer {
        &self.idp
    }

    /// `Cookie` header value carrying `token` as the session.
    pub fn session_cookie(&self, token: &str) -> String {
        format!("{}={}", self.config.session_cookie_name, token)
    }
}

impl Drop for TestGatewayServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends.
        self._handle.abort();
    }
}
