//! JWT utilities shared by the gateway and its test tooling.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Key ID extraction from JWT headers
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Error messages are generic; details are logged at debug level only
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_token_size, extract_kid, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! check_token_size(token)?;
//! let kid = extract_kid(token)?;
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Session tokens are a few hundred bytes. Anything larger than this is
/// rejected BEFORE base64 decoding or signature verification so that an
/// oversized cookie or header cannot burn CPU and memory.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with an `iat` (issued-at) more than this far in the future are
/// rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration so the iat check cannot be disabled by
/// setting an enormous tolerance.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT structural validation.
///
/// Messages are intentionally identical so that callers cannot distinguish
/// failure causes from the outside.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The session token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The session token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The session token is invalid or expired")]
    MissingKid,

    /// Token `iat` claim is too far in the future.
    #[error("The session token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Reject tokens larger than [`MAX_JWT_SIZE_BYTES`].
///
/// # Errors
///
/// Returns `JwtValidationError::TokenTooLarge` when the token exceeds the limit.
pub fn check_token_size(token: &str) -> Result<(), JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }
    Ok(())
}

/// Extract the `kid` (key ID) from a JWT header without verifying the signature.
///
/// Used to pick the verification key, and to reject tokens signed under a key
/// the gateway does not hold before doing any cryptographic work.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - This function does NOT validate the token signature
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong structure, bad base64, or invalid JSON
/// - `MissingKid` - Header missing `kid`, or `kid` is empty or not a string
pub fn extract_kid(token: &str) -> Result<String, JwtValidationError> {
    check_token_size(token)?;

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Callers that already hold a `now` (for example a codec evaluating expiry
/// against the same instant) use this to keep both checks consistent.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat > now + clock_skew`.
pub fn validate_iat_at(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
