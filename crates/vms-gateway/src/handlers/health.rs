//! Liveness probe.

use tracing::instrument;

/// Handler for GET /health
///
/// The gateway holds no connections of its own, so liveness is unconditional.
#[instrument(skip_all, name = "gw.health.check")]
pub async fn health_check() -> &'static str {
    "OK"
}
