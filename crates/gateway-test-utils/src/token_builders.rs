//! Session token builders for tests.
//!
//! Tokens are signed by the real codec, so only `iat`, `exp`, and the
//! identity are under test control.

use crate::crypto_fixtures::{forged_codec, server_codec};
use chrono::Utc;
use vms_gateway::auth::{Role, SessionIdentity, TokenCodec};

/// Default lifetime of a built token.
pub const TEST_SESSION_TTL_SECONDS: i64 = 300;

/// Builder for session tokens accepted by `TestGatewayServer`.
///
/// # Example
/// ```rust,ignore
/// // Token with 30 seconds left out of 300
/// let token = TestSessionBuilder::new()
///     .issued_ago(270)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestSessionBuilder {
    identity: SessionIdentity,
    iat: i64,
    lifetime: i64,
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSessionBuilder {
    /// Non-admin user `user-1` in `org-1`, issued now, valid for five minutes.
    pub fn new() -> Self {
        Self {
            identity: SessionIdentity {
                sub: "user-1".to_string(),
                role: Role::User,
                org_id: "org-1".to_string(),
                email: Some("user-1@example.com".to_string()),
                name: Some("Test User".to_string()),
            },
            iat: Utc::now().timestamp(),
            lifetime: TEST_SESSION_TTL_SECONDS,
        }
    }

    /// Admin `admin-1` in `org-1`.
    pub fn admin() -> Self {
        Self::new().subject("admin-1").role(Role::Admin)
    }

    pub fn subject(mut self, sub: &str) -> Self {
        self.identity.sub = sub.to_string();
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.identity.role = role;
        self
    }

    pub fn org(mut self, org_id: &str) -> Self {
        self.identity.org_id = org_id.to_string();
        self
    }

    /// Set `iat` to `seconds` before now.
    pub fn issued_ago(mut self, seconds: i64) -> Self {
        self.iat = Utc::now().timestamp() - seconds;
        self
    }

    /// Set `exp - iat`.
    pub fn lifetime(mut self, seconds: i64) -> Self {
        self.lifetime = seconds;
        self
    }

    /// Token that expired `seconds` ago.
    pub fn expired_for(self, seconds: i64) -> Self {
        let lifetime = self.lifetime;
        self.issued_ago(lifetime + seconds)
    }

    /// Expiry of the token `build` will produce.
    pub fn expires_at(&self) -> i64 {
        self.iat + self.lifetime
    }

    /// Sign with the test server's key.
    pub fn build(&self) -> String {
        self.sign(&server_codec())
    }

    /// Sign with a key the server does not hold.
    pub fn build_forged(&self) -> String {
        self.sign(&forged_codec())
    }

    fn sign(&self, codec: &TokenCodec) -> String {
        codec
            .issue_at(&self.identity, self.lifetime, self.iat)
            .expect("Failed to sign test session token")
            .as_str()
            .to_string()
    }
}
