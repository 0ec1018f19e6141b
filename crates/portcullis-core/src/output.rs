//! Handler output.

use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::pin::Pin;

/// A stream of body chunks produced by a handler.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send + Sync>>;

/// The value a content-producing handler returns.
///
/// The variant fixes how the response body is serialized and which default
/// content type applies: `Text` renders as `text/html`, `Binary` and
/// `Stream` as `application/octet-stream`, and `Json` as
/// `application/json`. An explicitly staged mime type overrides the
/// default.
pub enum Output {
    /// Text, sent verbatim.
    Text(String),
    /// Raw bytes, sent verbatim.
    Binary(Bytes),
    /// Chunked body produced on the fly.
    Stream(BodyStream),
    /// A structure serialized as JSON.
    Json(serde_json::Value),
}

impl Output {
    /// Returns the default content type for this variant.
    #[must_use]
    pub const fn default_mime(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/html",
            Self::Binary(_) | Self::Stream(_) => "application/octet-stream",
            Self::Json(_) => "application/json",
        }
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Binary(b) => f.debug_tuple("Binary").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<String> for Output {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Output {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Bytes> for Output {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

impl From<Vec<u8>> for Output {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(b))
    }
}

impl From<serde_json::Value> for Output {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}
