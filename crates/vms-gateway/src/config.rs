//! Gateway configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use base64::{engine::general_purpose::STANDARD, Engine};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "vms_session";

/// Default session key ID placed in the JWT `kid` header.
pub const DEFAULT_SESSION_KEY_ID: &str = "session-key-01";

/// Default session lifetime (24 hours).
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 86_400;

/// Default fraction of the session TTL below which a token is reissued.
pub const DEFAULT_SESSION_REFRESH_THRESHOLD: f64 = 0.2;

/// Default relay URL template. `{systemId}` is replaced per request.
pub const DEFAULT_RELAY_URL_TEMPLATE: &str = "https://{systemId}.relay.vmsproxy.com";

/// Placeholder substituted with the resolved system ID.
pub const SYSTEM_ID_PLACEHOLDER: &str = "{systemId}";

/// Default relay request timeout in seconds.
pub const DEFAULT_RELAY_TIMEOUT_SECONDS: u64 = 15;

/// Default identity provider request timeout in seconds.
pub const DEFAULT_IDP_TIMEOUT_SECONDS: u64 = 10;

/// Whole-request timeout applied by the router.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for upstream timeouts. Must stay below
/// `REQUEST_TIMEOUT_SECONDS` so an upstream timeout surfaces as a 504 before
/// the router gives up on the request.
pub const MAX_UPSTREAM_TIMEOUT_SECONDS: u64 = 25;

/// Default look-back window for time-ranged relay endpoints.
pub const DEFAULT_RELAY_WINDOW_DAYS: i64 = 30;

/// Default page size for the events endpoint.
pub const DEFAULT_EVENTS_LIMIT: u32 = 50;

/// Upper bound for any caller-supplied `limit`.
pub const MAX_EVENTS_LIMIT: u32 = 1000;

/// Deployment environment. Controls the `Secure` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Gateway configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Secrets are redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Deployment environment (`APP_ENV`).
    pub environment: Environment,

    /// Base64-encoded 32-byte Ed25519 seed used to sign session tokens.
    pub session_signing_key: SecretString,

    /// Key ID written to and required in the JWT header.
    pub session_key_id: String,

    /// Name of the HTTP-only session cookie.
    pub session_cookie_name: String,

    /// Session lifetime in seconds; also the cookie `Max-Age`.
    pub session_ttl_seconds: i64,

    /// Fraction of the TTL below which a valid session is reissued.
    pub session_refresh_threshold: f64,

    /// JWT clock skew tolerance in seconds for iat validation.
    pub jwt_clock_skew_seconds: i64,

    /// Base URL of the external identity provider.
    pub idp_base_url: String,

    /// API key presented to the identity provider.
    pub idp_api_key: Option<SecretString>,

    /// Identity provider request timeout in seconds.
    pub idp_timeout_seconds: u64,

    /// Relay base URL template containing `{systemId}`.
    pub relay_url_template: String,

    /// Token presented to the cloud relay.
    pub relay_api_token: Option<SecretString>,

    /// Relay request timeout in seconds.
    pub relay_timeout_seconds: u64,

    /// Default look-back window in days when `from` is absent.
    pub relay_default_window_days: i64,

    /// Default `limit` for the events endpoint.
    pub events_default_limit: u32,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("environment", &self.environment)
            .field("session_signing_key", &"[REDACTED]")
            .field("session_key_id", &self.session_key_id)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .field("session_refresh_threshold", &self.session_refresh_threshold)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("idp_base_url", &self.idp_base_url)
            .field("idp_api_key", &self.idp_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("idp_timeout_seconds", &self.idp_timeout_seconds)
            .field("relay_url_template", &self.relay_url_template)
            .field(
                "relay_api_token",
                &self.relay_api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("relay_timeout_seconds", &self.relay_timeout_seconds)
            .field("relay_default_window_days", &self.relay_default_window_days)
            .field("events_default_limit", &self.events_default_limit)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("Invalid session signing key: {0}")]
    InvalidSigningKey(String),

    #[error("Invalid session configuration: {0}")]
    InvalidSession(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid relay configuration: {0}")]
    InvalidRelay(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let environment = match vars.get("APP_ENV").map(|s| s.trim().to_ascii_lowercase()) {
            None => Environment::Development,
            Some(v) if v == "development" => Environment::Development,
            Some(v) if v == "test" => Environment::Test,
            Some(v) if v == "production" => Environment::Production,
            Some(v) => {
                return Err(ConfigError::InvalidEnvironment(format!(
                    "APP_ENV must be one of development, test, production, got '{}'",
                    v
                )))
            }
        };

        let session_signing_key = vars
            .get("SESSION_SIGNING_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("SESSION_SIGNING_KEY".to_string()))?;
        let seed_len = STANDARD
            .decode(session_signing_key.trim())
            .map_err(|e| {
                ConfigError::InvalidSigningKey(format!(
                    "SESSION_SIGNING_KEY must be standard base64: {}",
                    e
                ))
            })?
            .len();
        if seed_len != 32 {
            return Err(ConfigError::InvalidSigningKey(format!(
                "SESSION_SIGNING_KEY must decode to 32 bytes, got {}",
                seed_len
            )));
        }
        let session_signing_key = SecretString::from(session_signing_key.trim().to_string());

        let session_key_id = vars
            .get("SESSION_KEY_ID")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SESSION_KEY_ID.to_string());
        if session_key_id.is_empty() {
            return Err(ConfigError::InvalidSession(
                "SESSION_KEY_ID must not be empty".to_string(),
            ));
        }

        let session_cookie_name = vars
            .get("SESSION_COOKIE_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string());
        if session_cookie_name.is_empty()
            || !session_cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidSession(format!(
                "SESSION_COOKIE_NAME must be a non-empty token of [A-Za-z0-9_-], got '{}'",
                session_cookie_name
            )));
        }

        let session_ttl_seconds = if let Some(value_str) = vars.get("SESSION_TTL_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidSession(format!(
                    "SESSION_TTL_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            if value <= 0 {
                return Err(ConfigError::InvalidSession(format!(
                    "SESSION_TTL_SECONDS must be positive, got {}",
                    value
                )));
            }
            value
        } else {
            DEFAULT_SESSION_TTL_SECONDS
        };

        let session_refresh_threshold =
            if let Some(value_str) = vars.get("SESSION_REFRESH_THRESHOLD") {
                let value: f64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidSession(format!(
                        "SESSION_REFRESH_THRESHOLD must be a number, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if !(value > 0.0 && value < 1.0) {
                    return Err(ConfigError::InvalidSession(format!(
                        "SESSION_REFRESH_THRESHOLD must be between 0 and 1 (exclusive), got {}",
                        value
                    )));
                }
                value
            } else {
                DEFAULT_SESSION_REFRESH_THRESHOLD
            };

        // Parse JWT clock skew tolerance with validation
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let idp_base_url = vars
            .get("IDP_BASE_URL")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8090".to_string())
            .trim_end_matches('/')
            .to_string();

        let idp_api_key = vars
            .get("IDP_API_KEY")
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.clone()));

        let idp_timeout_seconds =
            parse_timeout(vars, "IDP_TIMEOUT_SECONDS", DEFAULT_IDP_TIMEOUT_SECONDS)?;

        let relay_url_template = vars
            .get("RELAY_URL_TEMPLATE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_RELAY_URL_TEMPLATE.to_string())
            .trim_end_matches('/')
            .to_string();
        if !relay_url_template.contains(SYSTEM_ID_PLACEHOLDER) {
            return Err(ConfigError::InvalidRelay(format!(
                "RELAY_URL_TEMPLATE must contain {}, got '{}'",
                SYSTEM_ID_PLACEHOLDER, relay_url_template
            )));
        }
        if !(relay_url_template.starts_with("https://")
            || relay_url_template.starts_with("http://"))
        {
            return Err(ConfigError::InvalidRelay(format!(
                "RELAY_URL_TEMPLATE must be an http(s) URL, got '{}'",
                relay_url_template
            )));
        }

        let relay_api_token = vars
            .get("RELAY_API_TOKEN")
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.clone()));

        let relay_timeout_seconds =
            parse_timeout(vars, "RELAY_TIMEOUT_SECONDS", DEFAULT_RELAY_TIMEOUT_SECONDS)?;

        let relay_default_window_days =
            if let Some(value_str) = vars.get("RELAY_DEFAULT_WINDOW_DAYS") {
                let value: i64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidRelay(format!(
                        "RELAY_DEFAULT_WINDOW_DAYS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;
                if value <= 0 {
                    return Err(ConfigError::InvalidRelay(format!(
                        "RELAY_DEFAULT_WINDOW_DAYS must be positive, got {}",
                        value
                    )));
                }
                value
            } else {
                DEFAULT_RELAY_WINDOW_DAYS
            };

        let events_default_limit = if let Some(value_str) = vars.get("EVENTS_DEFAULT_LIMIT") {
            let value: u32 = value_str.parse().map_err(|e| {
                ConfigError::InvalidRelay(format!(
                    "EVENTS_DEFAULT_LIMIT must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;
            if value == 0 || value > MAX_EVENTS_LIMIT {
                return Err(ConfigError::InvalidRelay(format!(
                    "EVENTS_DEFAULT_LIMIT must be between 1 and {}, got {}",
                    MAX_EVENTS_LIMIT, value
                )));
            }
            value
        } else {
            DEFAULT_EVENTS_LIMIT
        };

        Ok(Config {
            bind_address,
            environment,
            session_signing_key,
            session_key_id,
            session_cookie_name,
            session_ttl_seconds,
            session_refresh_threshold,
            jwt_clock_skew_seconds,
            idp_base_url,
            idp_api_key,
            idp_timeout_seconds,
            relay_url_template,
            relay_api_token,
            relay_timeout_seconds,
            relay_default_window_days,
            events_default_limit,
        })
    }

    /// Raw base64 signing seed. Only the token codec should call this.
    pub(crate) fn signing_key_b64(&self) -> &str {
        self.session_signing_key.expose_secret()
    }
}

fn parse_timeout(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 || value > MAX_UPSTREAM_TIMEOUT_SECONDS {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be between 1 and {} seconds, got {}",
            name, MAX_UPSTREAM_TIMEOUT_SECONDS, value
        )));
    }

    Ok(value)
}
