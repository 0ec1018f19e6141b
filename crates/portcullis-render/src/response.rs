//! The serialized response handed to the transport.

use bytes::Bytes;
use portcullis_core::{BodyStream, BoxFuture, GateResult, Scope};
use http::StatusCode;

/// The response body, either fully buffered or produced on the fly.
pub enum ResponseBody {
    /// A complete body.
    Buffered(Bytes),
    /// A chunked body.
    Streamed(BodyStream),
}

impl ResponseBody {
    /// The body length, when known up front.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Buffered(bytes) => Some(bytes.len()),
            Self::Streamed(_) => None,
        }
    }

    /// Returns true when the body is known to be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// A fully serialized response: status, final header list and body.
///
/// Header names are already normalized and ordered; a name may appear more
/// than once when values were appended.
#[derive(Debug)]
pub struct Rendered {
    /// Response status.
    pub status: StatusCode,
    /// Final headers, in send order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: ResponseBody,
}

impl Rendered {
    /// The response sent when even error serialization fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            headers: vec![(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )],
            body: ResponseBody::Buffered(Bytes::from_static(
                br#"{"errors":["Internal server error"]}"#,
            )),
        }
    }

    /// Returns the first header with this name, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serializes a finished run into a [`Rendered`] response.
///
/// The framework installs [`Renderer`](crate::Renderer) in both send
/// slots; applications may replace either slot with their own
/// implementation. Implemented for `Fn(Scope) -> impl Future` closures.
pub trait SendHandler: Send + Sync {
    /// Produces the response from the staged context state.
    fn render(&self, scope: Scope) -> BoxFuture<GateResult<Rendered>>;
}

impl<F, Fut> SendHandler for F
where
    F: Fn(Scope) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = GateResult<Rendered>> + Send + 'static,
{
    fn render(&self, scope: Scope) -> BoxFuture<GateResult<Rendered>> {
        Box::pin(self(scope))
    }
}
