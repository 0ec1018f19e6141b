//! Outgoing cookie construction.

use crate::{GateError, GateResult};
use std::time::SystemTime;

/// A cookie staged for the response.
///
/// Serializes in a fixed attribute order: `name=value`, `Expires`, `Path`,
/// `Domain`, `Secure`, `HttpOnly`. Cookies are `HttpOnly` unless opted out,
/// and `Secure` defaults to whether the request itself arrived over a
/// secure channel.
///
/// # Example
///
/// ```
/// use portcullis_core::SetCookie;
///
/// let cookie = SetCookie::new("session", "abc123").path("/admin");
/// assert_eq!(cookie.serialize(false), "session=abc123; Path=/admin; HttpOnly");
/// ```
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    expires: Option<SystemTime>,
    path: Option<String>,
    domain: Option<String>,
    secure: Option<bool>,
    http_only: bool,
}

impl SetCookie {
    /// Creates a cookie with default attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
            path: None,
            domain: None,
            secure: None,
            http_only: true,
        }
    }

    /// Sets the expiry date.
    #[must_use]
    pub fn expires(mut self, when: SystemTime) -> Self {
        self.expires = Some(when);
        self
    }

    /// Restricts the cookie to a path prefix.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Restricts the cookie to a domain.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Overrides the `Secure` flag.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Overrides the `HttpOnly` flag.
    #[must_use]
    pub const fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// The cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates that the cookie can be sent without corrupting the
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::IllegalCookie`] when the name contains `=` or
    /// when any part carries a separator or control character.
    pub fn validate(&self) -> GateResult<()> {
        if self.name.contains('=') || !is_token(&self.name) {
            return Err(GateError::illegal_cookie(&self.name));
        }
        if !is_token(&self.value) {
            return Err(GateError::illegal_cookie(&self.name));
        }
        for part in [&self.path, &self.domain].into_iter().flatten() {
            if !is_token(part) {
                return Err(GateError::illegal_cookie(&self.name));
            }
        }
        Ok(())
    }

    /// Renders the `Set-Cookie` header value.
    ///
    /// `default_secure` supplies the `Secure` flag when the cookie did not
    /// set one; callers pass whether the request arrived over a secure
    /// channel.
    #[must_use]
    pub fn serialize(&self, default_secure: bool) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        if let Some(when) = self.expires {
            out.push_str("; Expires=");
            out.push_str(&httpdate::fmt_http_date(when));
        }
        if let Some(path) = &self.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &self.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.secure.unwrap_or(default_secure) {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Rejects separators and control characters that would corrupt the
/// header.
fn is_token(part: &str) -> bool {
    part.chars()
        .all(|c| !c.is_control() && c != ';' && c != ',')
}
