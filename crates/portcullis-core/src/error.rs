//! Error types for Portcullis.
//!
//! [`GateError`] is the standard error type flowing through a request run.
//! Handlers return it to divert the run onto the error track; the framework
//! itself raises it for routing and transport failures. Every error maps to
//! an HTTP status code through its [`ErrorKind`].

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Result type alias using [`GateError`].
pub type GateResult<T> = Result<T, GateError>;

/// Classification of request-run errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request validation failed.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// Permission denied.
    Authorization,
    /// No route matched, or a resource is missing.
    NotFound,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Standard error type for request runs.
///
/// # Example
///
/// ```
/// use portcullis_core::GateError;
///
/// fn check_token(token: Option<&str>) -> Result<(), GateError> {
///     match token {
///         Some(_) => Ok(()),
///         None => Err(GateError::authentication("missing token")),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone)]
pub enum GateError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// Authorization denied.
    #[error("Authorization error: {message}")]
    Authorization {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// A header name or value contained characters that cannot be sent.
    #[error("Illegal header {name}")]
    IllegalHeader {
        /// The offending header name.
        name: String,
    },

    /// A cookie name or attribute contained characters that cannot be sent.
    #[error("Illegal cookie {name}")]
    IllegalCookie {
        /// The offending cookie name.
        name: String,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl GateError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an illegal-header error.
    pub fn illegal_header(name: impl Into<String>) -> Self {
        Self::IllegalHeader { name: name.into() }
    }

    /// Creates an illegal-cookie error.
    pub fn illegal_cookie(name: impl Into<String>) -> Self {
        Self::IllegalCookie { name: name.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::IllegalHeader { .. } | Self::IllegalCookie { .. } | Self::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}
