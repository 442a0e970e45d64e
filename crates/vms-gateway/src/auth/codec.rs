//! Session token encoding and verification.
//!
//! Session tokens are EdDSA (Ed25519) JWTs signed with a key derived from a
//! 32-byte seed held in configuration.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only EdDSA is accepted; the header `kid` must match the configured key
//! - The signature is verified before expiry is evaluated, so a forged
//!   expired token is `Invalid`, never `Expired`
//! - Failure causes are logged at debug level only

use crate::auth::claims::{SessionClaims, SessionIdentity};
use crate::config::Config;
use base64::{engine::general_purpose::STANDARD, Engine};
use common::jwt::{check_token_size, extract_kid, validate_iat_at};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::signature::{Ed25519KeyPair, KeyPair};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result of verifying a raw session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionVerdict {
    Valid(SessionClaims),
    Expired,
    Invalid,
}

impl SessionVerdict {
    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            SessionVerdict::Valid(_) => "valid",
            SessionVerdict::Expired => "expired",
            SessionVerdict::Invalid => "invalid",
        }
    }
}

/// A signed session token. The token string is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: i64,
}

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Expiry of the token (Unix epoch seconds).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Invalid session TTL: {0}")]
    InvalidTtl(i64),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    key_id: String,
    clock_skew: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("keys", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl TokenCodec {
    /// Create a codec from a raw Ed25519 seed.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidKey` if the seed is not 32 bytes.
    pub fn new(seed: &[u8], key_id: &str, clock_skew: Duration) -> Result<Self, CodecError> {
        if seed.len() != 32 {
            return Err(CodecError::InvalidKey(format!(
                "seed must be 32 bytes, got {}",
                seed.len()
            )));
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| CodecError::InvalidKey(format!("seed rejected: {}", e)))?;
        let pkcs8 = build_pkcs8_from_seed(seed);

        Ok(Self {
            encoding_key: EncodingKey::from_ed_der(&pkcs8),
            decoding_key: DecodingKey::from_ed_der(key_pair.public_key().as_ref()),
            key_id: key_id.to_string(),
            clock_skew,
        })
    }

    /// Create a codec from the configured base64 seed, key ID, and clock skew.
    pub fn from_config(config: &Config) -> Result<Self, CodecError> {
        let seed = STANDARD
            .decode(config.signing_key_b64())
            .map_err(|e| CodecError::InvalidKey(format!("seed is not base64: {}", e)))?;
        let clock_skew = Duration::from_secs(config.jwt_clock_skew_seconds.unsigned_abs());
        Self::new(&seed, &config.session_key_id, clock_skew)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Verify a raw token against the wall clock.
    pub fn verify(&self, raw: &str) -> SessionVerdict {
        self.verify_at(raw, chrono::Utc::now().timestamp())
    }

    /// Verify a raw token as of `now` (Unix epoch seconds).
    pub fn verify_at(&self, raw: &str, now: i64) -> SessionVerdict {
        if check_token_size(raw).is_err() {
            return SessionVerdict::Invalid;
        }

        match extract_kid(raw) {
            Ok(kid) if kid == self.key_id => {}
            Ok(kid) => {
                tracing::debug!(target: "gw.auth.codec", kid = %kid, "Token signed under unknown key");
                return SessionVerdict::Invalid;
            }
            Err(e) => {
                tracing::debug!(target: "gw.auth.codec", error = ?e, "Token kid extraction failed");
                return SessionVerdict::Invalid;
            }
        }

        let mut validation = Validation::new(Algorithm::EdDSA);
        // Expiry is evaluated below against the caller's `now`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = match decode::<SessionClaims>(raw, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(target: "gw.auth.codec", error = %e, "Token verification failed");
                return SessionVerdict::Invalid;
            }
        };

        if let Err(e) = validate_iat_at(claims.iat, self.clock_skew, now) {
            tracing::debug!(target: "gw.auth.codec", error = ?e, "Token iat validation failed");
            return SessionVerdict::Invalid;
        }

        if claims.exp < claims.iat {
            tracing::debug!(target: "gw.auth.codec", "Token expires before it was issued");
            return SessionVerdict::Invalid;
        }

        if claims.exp <= now {
            tracing::debug!(target: "gw.auth.codec", exp = claims.exp, now, "Token expired");
            return SessionVerdict::Expired;
        }

        SessionVerdict::Valid(claims)
    }

    /// Issue a token for `identity` valid for `ttl_seconds` from the wall clock.
    pub fn issue(
        &self,
        identity: &SessionIdentity,
        ttl_seconds: i64,
    ) -> Result<Credential, CodecError> {
        self.issue_at(identity, ttl_seconds, chrono::Utc::now().timestamp())
    }

    /// Issue a token with `iat = now` and `exp = now + ttl_seconds`.
    pub fn issue_at(
        &self,
        identity: &SessionIdentity,
        ttl_seconds: i64,
        now: i64,
    ) -> Result<Credential, CodecError> {
        if ttl_seconds <= 0 {
            return Err(CodecError::InvalidTtl(ttl_seconds));
        }
        let exp = now
            .checked_add(ttl_seconds)
            .ok_or(CodecError::InvalidTtl(ttl_seconds))?;

        let claims = SessionClaims {
            sub: identity.sub.clone(),
            role: identity.role,
            org_id: identity.org_id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            iat: now,
            exp,
        };

        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "gw.auth.codec", error = %e, "Failed to sign session token");
            CodecError::Signing(e.to_string())
        })?;

        Ok(Credential {
            token,
            expires_at: exp,
        })
    }
}

/// Wrap a raw 32-byte Ed25519 seed in a PKCS#8 v1 DER document.
///
/// `jsonwebtoken` loads Ed25519 signing keys from PKCS#8 only.
pub fn build_pkcs8_from_seed(seed: &[u8]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(16 + seed.len());
    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // INTEGER version 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // SEQUENCE { OID 1.3.101.112 (Ed25519) }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);
    pkcs8
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_JWT_SIZE_BYTES};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;
    const KID: &str = "session-key-01";

    fn codec_with_seed(seed: u8) -> TokenCodec {
        TokenCodec::new(&[seed; 32], KID, DEFAULT_CLOCK_SKEW).unwrap()
    }

    fn identity() -> SessionIdentity {
        SessionIdentity {
            sub: "user-1".to_string(),
            role: Role::Admin,
            org_id: "org-1".to_string(),
            email: Some("admin@example.com".to_string()),
            name: None,
        }
    }

    /// Sign arbitrary JSON claims with the key derived from `seed`.
    fn sign_raw(seed: u8, kid: &str, claims: &serde_json::Value) -> String {
        let key = EncodingKey::from_ed_der(&build_pkcs8_from_seed(&[seed; 32]));
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &key).unwrap()
    }

    #[test]
    fn test_new_rejects_short_seed() {
        let result = TokenCodec::new(&[1u8; 16], KID, DEFAULT_CLOCK_SKEW);
        assert!(matches!(result, Err(CodecError::InvalidKey(_))));
    }

    #[test]
    fn test_issue_then_verify_is_valid() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 3600, NOW).unwrap();

        assert_eq!(credential.expires_at(), NOW + 3600);
        match codec.verify_at(credential.as_str(), NOW + 10) {
            SessionVerdict::Valid(claims) => {
                assert_eq!(claims.sub, "user-1");
                assert_eq!(claims.role, Role::Admin);
                assert_eq!(claims.org_id, "org-1");
                assert_eq!(claims.email.as_deref(), Some("admin@example.com"));
                assert_eq!(claims.iat, NOW);
                assert_eq!(claims.exp, NOW + 3600);
            }
            other => panic!("expected Valid, got {:?}", other),
        }
    }

    #[test]
    fn test_issued_header_carries_kid() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 60, NOW).unwrap();
        assert_eq!(extract_kid(credential.as_str()).unwrap(), KID);
    }

    #[test]
    fn test_expired_token_is_expired() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 60, NOW).unwrap();

        assert_eq!(codec.verify_at(credential.as_str(), NOW + 61), SessionVerdict::Expired);
    }

    #[test]
    fn test_token_at_exact_expiry_is_expired() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 60, NOW).unwrap();

        assert_eq!(codec.verify_at(credential.as_str(), NOW + 60), SessionVerdict::Expired);
        assert!(matches!(
            codec.verify_at(credential.as_str(), NOW + 59),
            SessionVerdict::Valid(_)
        ));
    }

    #[test]
    fn test_token_from_other_key_is_invalid() {
        let issuer = codec_with_seed(7);
        let verifier = codec_with_seed(8);
        let credential = issuer.issue_at(&identity(), 3600, NOW).unwrap();

        assert_eq!(verifier.verify_at(credential.as_str(), NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_forged_expired_token_is_invalid_not_expired() {
        let issuer = codec_with_seed(7);
        let verifier = codec_with_seed(8);
        let credential = issuer.issue_at(&identity(), 60, NOW).unwrap();

        assert_eq!(
            verifier.verify_at(credential.as_str(), NOW + 3600),
            SessionVerdict::Invalid
        );
    }

    #[test]
    fn test_wrong_kid_is_invalid() {
        let codec = codec_with_seed(7);
        let other = TokenCodec::new(&[7u8; 32], "session-key-02", DEFAULT_CLOCK_SKEW).unwrap();
        let credential = other.issue_at(&identity(), 3600, NOW).unwrap();

        assert_eq!(codec.verify_at(credential.as_str(), NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 3600, NOW).unwrap();

        let parts: Vec<&str> = credential.as_str().split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(
            json!({"sub":"user-1","role":"admin","org_id":"org-2","iat":NOW,"exp":NOW + 3600})
                .to_string(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.verify_at(&forged, NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_garbage_and_empty_tokens_are_invalid() {
        let codec = codec_with_seed(7);
        for raw in ["", "garbage", "a.b.c", "a.b", "..."] {
            assert_eq!(codec.verify_at(raw, NOW), SessionVerdict::Invalid, "raw={raw:?}");
        }
    }

    #[test]
    fn test_oversized_token_is_invalid() {
        let codec = codec_with_seed(7);
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(codec.verify_at(&oversized, NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_hmac_token_with_matching_kid_is_invalid() {
        let codec = codec_with_seed(7);
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.to_string());
        let token = encode(
            &header,
            &json!({"sub":"u","role":"admin","org_id":"o","iat":NOW,"exp":NOW + 60}),
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();

        assert_eq!(codec.verify_at(&token, NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_unknown_role_is_invalid() {
        let codec = codec_with_seed(7);
        let token = sign_raw(
            7,
            KID,
            &json!({"sub":"u","role":"root","org_id":"o","iat":NOW,"exp":NOW + 60}),
        );
        assert_eq!(codec.verify_at(&token, NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_missing_claim_is_invalid() {
        let codec = codec_with_seed(7);
        let no_org = sign_raw(7, KID, &json!({"sub":"u","role":"user","iat":NOW,"exp":NOW + 60}));
        let no_exp = sign_raw(7, KID, &json!({"sub":"u","role":"user","org_id":"o","iat":NOW}));
        let ill_typed = sign_raw(
            7,
            KID,
            &json!({"sub":"u","role":"user","org_id":"o","iat":NOW,"exp":"later"}),
        );

        assert_eq!(codec.verify_at(&no_org, NOW), SessionVerdict::Invalid);
        assert_eq!(codec.verify_at(&no_exp, NOW), SessionVerdict::Invalid);
        assert_eq!(codec.verify_at(&ill_typed, NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_iat_beyond_clock_skew_is_invalid() {
        let codec = codec_with_seed(7);
        let future = NOW + DEFAULT_CLOCK_SKEW.as_secs() as i64 + 1;
        let credential = codec.issue_at(&identity(), 3600, future).unwrap();

        assert_eq!(codec.verify_at(credential.as_str(), NOW), SessionVerdict::Invalid);
    }

    #[test]
    fn test_iat_within_clock_skew_is_valid() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 3600, NOW + 60).unwrap();

        assert!(matches!(
            codec.verify_at(credential.as_str(), NOW),
            SessionVerdict::Valid(_)
        ));
    }

    #[test]
    fn test_issue_rejects_non_positive_ttl() {
        let codec = codec_with_seed(7);
        assert!(matches!(
            codec.issue_at(&identity(), 0, NOW),
            Err(CodecError::InvalidTtl(0))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let codec = codec_with_seed(7);
        let credential = codec.issue_at(&identity(), 60, NOW).unwrap();
        let debug = format!("{:?} {:?}", credential, codec);

        assert!(!debug.contains(credential.as_str()));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_pkcs8_layout() {
        let pkcs8 = build_pkcs8_from_seed(&[9u8; 32]);
        assert_eq!(pkcs8.len(), 48);
        assert_eq!(&pkcs8[..2], &[0x30, 0x2e]);
        assert!(Ed25519KeyPair::from_pkcs8_maybe_unchecked(&pkcs8).is_ok());
    }
}
