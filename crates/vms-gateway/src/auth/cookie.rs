//! Session cookie reading and `Set-Cookie` rendering.

use axum::http::{header, HeaderMap, HeaderValue};

/// Attributes shared by every session cookie the gateway writes.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the session token from the request's `Cookie` headers.
    ///
    /// Empty values are treated as absent.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }

    /// `Set-Cookie` value carrying `token` for `max_age_seconds`.
    pub fn issue(&self, token: &str, max_age_seconds: i64) -> Option<HeaderValue> {
        self.render(token, max_age_seconds)
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear(&self) -> Option<HeaderValue> {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age_seconds: i64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name,
            value,
            max_age_seconds.max(0)
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
            .map_err(|e| {
                tracing::error!(target: "gw.auth.cookie", error = %e, "Unrenderable session cookie");
            })
            .ok()
    }
}
