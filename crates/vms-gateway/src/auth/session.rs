//! Session validation with sliding-window refresh.
//!
//! A valid session whose remaining lifetime has dropped below
//! `ttl * refresh_threshold` is reissued with a fresh full TTL. Expired or
//! invalid sessions are never refreshed.

use crate::auth::claims::{SessionClaims, SessionIdentity};
use crate::auth::codec::{CodecError, Credential, SessionVerdict, TokenCodec};
use crate::config::Config;
use crate::observability::metrics;
use tracing::instrument;

/// Whether the response should carry a replacement token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshDecision {
    NoRefreshNeeded,
    Reissue(Credential),
}

/// Verdict for one token plus the refresh decision made for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionValidation {
    pub verdict: SessionVerdict,
    pub refresh: RefreshDecision,
}

impl SessionValidation {
    fn rejected(verdict: SessionVerdict) -> Self {
        Self {
            verdict,
            refresh: RefreshDecision::NoRefreshNeeded,
        }
    }

    pub fn claims(&self) -> Option<&SessionClaims> {
        match &self.verdict {
            SessionVerdict::Valid(claims) => Some(claims),
            _ => None,
        }
    }
}

/// Validates session tokens and decides when to reissue them.
#[derive(Debug, Clone)]
pub struct SessionValidator {
    codec: TokenCodec,
    ttl_seconds: i64,
    refresh_threshold: f64,
}

impl SessionValidator {
    pub fn new(codec: TokenCodec, ttl_seconds: i64, refresh_threshold: f64) -> Self {
        Self {
            codec,
            ttl_seconds,
            refresh_threshold,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, CodecError> {
        Ok(Self::new(
            TokenCodec::from_config(config)?,
            config.session_ttl_seconds,
            config.session_refresh_threshold,
        ))
    }

    /// Session lifetime; also the cookie `Max-Age` on issue and refresh.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Issue a fresh full-TTL token, used at login.
    pub fn issue(&self, identity: &SessionIdentity) -> Result<Credential, CodecError> {
        self.codec.issue(identity, self.ttl_seconds)
    }

    #[instrument(skip_all)]
    pub fn validate(&self, raw: &str) -> SessionValidation {
        self.validate_at(raw, chrono::Utc::now().timestamp())
    }

    /// Validate `raw` as of `now` (Unix epoch seconds).
    pub fn validate_at(&self, raw: &str, now: i64) -> SessionValidation {
        let verdict = self.codec.verify_at(raw, now);
        metrics::record_session_validation(verdict.outcome());

        let claims = match &verdict {
            SessionVerdict::Valid(claims) => claims,
            SessionVerdict::Expired | SessionVerdict::Invalid => {
                tracing::debug!(
                    target: "gw.auth.session",
                    outcome = verdict.outcome(),
                    "Session rejected"
                );
                return SessionValidation::rejected(verdict);
            }
        };

        if !self.needs_refresh(claims.exp, now) {
            return SessionValidation {
                verdict,
                refresh: RefreshDecision::NoRefreshNeeded,
            };
        }

        let refresh = match self.codec.issue_at(&claims.identity(), self.ttl_seconds, now) {
            Ok(credential) if credential.expires_at() > claims.exp => {
                tracing::debug!(
                    target: "gw.auth.session",
                    old_exp = claims.exp,
                    new_exp = credential.expires_at(),
                    "Session reissued"
                );
                metrics::record_session_refresh();
                RefreshDecision::Reissue(credential)
            }
            Ok(_) => RefreshDecision::NoRefreshNeeded,
            Err(e) => {
                // The current token stays valid until its own expiry
                tracing::warn!(target: "gw.auth.session", error = %e, "Session refresh failed");
                RefreshDecision::NoRefreshNeeded
            }
        };

        SessionValidation { verdict, refresh }
    }

    #[allow(clippy::cast_precision_loss)]
    fn needs_refresh(&self, exp: i64, now: i64) -> bool {
        let remaining = exp.saturating_sub(now) as f64;
        remaining < self.ttl_seconds as f64 * self.refresh_threshold
    }
}
