//! Session claims structure.
//!
//! Contains the claims carried by a session token. The `sub` and `email`
//! fields are redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role granted to an authenticated operator.
///
/// Unknown role strings fail deserialization, which makes the token invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a session belongs to. Input to token issuance.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub sub: String,
    pub role: Role,
    pub org_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("sub", &"[REDACTED]")
            .field("role", &self.role)
            .field("org_id", &self.org_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .finish()
    }
}

/// Claims of a verified session token.
///
/// Every field except `email` and `name` is required; a token missing one
/// does not deserialize.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: String,

    pub role: Role,

    /// Organization (tenant) the user belongs to.
    pub org_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for SessionClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClaims")
            .field("sub", &"[REDACTED]")
            .field("role", &self.role)
            .field("org_id", &self.org_id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl SessionClaims {
    /// Identity portion of the claims, used to reissue a token.
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity {
            sub: self.sub.clone(),
            role: self.role,
            org_id: self.org_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
