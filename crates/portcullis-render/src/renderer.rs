//! The default response renderer.
//!
//! Serialization rules:
//!
//! - the output variant picks the content type (`Text` is `text/html`,
//!   `Binary` and `Stream` are `application/octet-stream`, `Json` is
//!   `application/json`); an explicitly staged mime type overrides it and
//!   also wins over a staged `Content-Type` header;
//! - text content types without a charset get one appended;
//! - `X-Content-Type-Options: nosniff` is attached to every response and
//!   `X-Frame-Options` to HTML responses, unless the application staged
//!   its own value;
//! - staged headers are flushed with title-case normalized names,
//!   appended values keeping their multiplicity;
//! - staged cookies become one `Set-Cookie` header each, `Secure`
//!   defaulting to the request channel.

use crate::{Rendered, RenderConfig, ResponseBody, SendHandler};
use bytes::Bytes;
use http::StatusCode;
use portcullis_core::{
    output, Args, BoxFuture, GateError, GateResult, HandlerResult, Output, Scope,
};
use serde_json::json;

/// The built-in [`SendHandler`], installed in both send slots.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Creates a renderer with the given configuration.
    #[must_use]
    pub const fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn render_sync(&self, scope: &Scope) -> GateResult<Rendered> {
        let mut ctx = scope.lock();
        let status = ctx.status();
        let secure = ctx.secure();
        let output = ctx.take_output();

        let mime = ctx.mime().map_or_else(
            || {
                output
                    .as_ref()
                    .map_or("application/json", Output::default_mime)
                    .to_string()
            },
            ToString::to_string,
        );
        let mime = self.with_charset(mime);

        let mut headers: Vec<(String, String)> = Vec::new();
        if self.config.nosniff_enabled() {
            apply_header(&mut headers, "X-Content-Type-Options", "nosniff", false);
        }
        for staged in ctx.staged_headers() {
            apply_header(
                &mut headers,
                &normalize_header_name(&staged.name),
                &staged.value,
                staged.append,
            );
        }
        if mime.starts_with("text/html") && !has_header(&headers, "X-Frame-Options") {
            apply_header(
                &mut headers,
                "X-Frame-Options",
                self.config.frame_options_value(),
                false,
            );
        }
        apply_header(&mut headers, "Content-Type", &mime, false);
        for cookie in ctx.staged_cookies() {
            apply_header(&mut headers, "Set-Cookie", &cookie.serialize(secure), true);
        }

        let body = match output {
            Some(Output::Text(text)) => ResponseBody::Buffered(Bytes::from(text)),
            Some(Output::Binary(bytes)) => ResponseBody::Buffered(bytes),
            Some(Output::Stream(stream)) => ResponseBody::Streamed(stream),
            Some(Output::Json(value)) => ResponseBody::Buffered(Bytes::from(
                serde_json::to_vec(&value)
                    .map_err(|e| GateError::internal(e.to_string()))?,
            )),
            None => ResponseBody::Buffered(Bytes::new()),
        };

        Ok(Rendered {
            status,
            headers,
            body,
        })
    }

    /// Appends the configured charset to text content types lacking one.
    fn with_charset(&self, mime: String) -> String {
        if mime.starts_with("text/") && !mime.contains("charset") {
            format!("{mime}; charset={}", self.config.charset_value())
        } else {
            mime
        }
    }
}

impl SendHandler for Renderer {
    fn render(&self, scope: Scope) -> BoxFuture<GateResult<Rendered>> {
        let result = self.render_sync(&scope);
        Box::pin(async move { result })
    }
}

/// The built-in error-phase handler.
///
/// Registered before any application error handlers, so applications can
/// overwrite the status and output it stages. Lifts success statuses to
/// 500 and stages the canned JSON error envelope for the status.
pub fn default_error_output(scope: Scope, _args: Args) -> impl std::future::Future<Output = HandlerResult> + Send {
    let staged = {
        let mut ctx = scope.lock();
        if ctx.status().as_u16() < 400 {
            ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if let Some(error) = ctx.error() {
            tracing::debug!(error = %error, status = %ctx.status(), "rendering error response");
        }
        json!({ "errors": [canned_message(ctx.status())] })
    };
    async move { output(staged) }
}

/// The fixed error message for a status code.
#[must_use]
pub fn canned_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "Bad request",
        StatusCode::UNAUTHORIZED => "Authentication required",
        StatusCode::FORBIDDEN => "Permission denied",
        StatusCode::NOT_FOUND => "Not found",
        _ => "Internal server error",
    }
}

/// Normalizes a header name to title case (`x-test-header` becomes
/// `X-Test-Header`).
#[must_use]
pub fn normalize_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut start_of_word = true;
    for c in name.chars() {
        if start_of_word {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        start_of_word = c == '-';
    }
    out
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

fn apply_header(headers: &mut Vec<(String, String)>, name: &str, value: &str, append: bool) {
    if !append {
        headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }
    headers.push((name.to_string(), value.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use portcullis_core::RequestContext;
    use serde_json::json;

    fn render(ctx: RequestContext) -> Rendered {
        let renderer = Renderer::default();
        renderer.render_sync(&ctx.into_scope()).unwrap()
    }

    #[test]
    fn test_text_output_is_html_with_charset() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_output(Output::from("<p>hi</p>"));
        let rendered = render(ctx);
        assert_eq!(rendered.status, StatusCode::OK);
        assert_eq!(
            rendered.header("Content-Type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(rendered.header("X-Frame-Options"), Some("deny"));
        assert_eq!(rendered.header("X-Content-Type-Options"), Some("nosniff"));
        assert!(matches!(rendered.body, ResponseBody::Buffered(b) if b == "<p>hi</p>"));
    }

    #[test]
    fn test_binary_output_is_octet_stream() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_output(Output::from(vec![1u8, 2, 3]));
        let rendered = render(ctx);
        assert_eq!(
            rendered.header("Content-Type"),
            Some("application/octet-stream")
        );
        assert_eq!(rendered.header("X-Frame-Options"), None);
    }

    #[test]
    fn test_structured_output_is_json() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_output(Output::from(json!({"a": 1})));
        let rendered = render(ctx);
        assert_eq!(rendered.header("Content-Type"), Some("application/json"));
        assert!(matches!(rendered.body, ResponseBody::Buffered(b) if b == r#"{"a":1}"#));
    }

    #[test]
    fn test_no_output_is_empty_json() {
        let ctx = RequestContext::new(Method::GET, "/");
        let rendered = render(ctx);
        assert_eq!(rendered.header("Content-Type"), Some("application/json"));
        assert!(rendered.body.is_empty());
    }

    #[test]
    fn test_explicit_mime_wins_over_output_and_staged_header() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_output(Output::from("body"));
        ctx.set_header("Content-Type", "application/xml").unwrap();
        ctx.set_mime("text/plain");
        let rendered = render(ctx);
        assert_eq!(
            rendered.header("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(
            rendered
                .headers
                .iter()
                .filter(|(n, _)| n == "Content-Type")
                .count(),
            1
        );
    }

    #[test]
    fn test_charset_not_doubled() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_mime("text/plain; charset=iso-8859-1");
        let rendered = render(ctx);
        assert_eq!(
            rendered.header("Content-Type"),
            Some("text/plain; charset=iso-8859-1")
        );
    }

    #[test]
    fn test_appended_headers_keep_multiplicity() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.append_header("x-test", "a").unwrap();
        ctx.append_header("X-TEST", "b").unwrap();
        let rendered = render(ctx);
        let values: Vec<&str> = rendered
            .headers
            .iter()
            .filter(|(n, _)| n == "X-Test")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_staged_frame_options_is_kept() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_output(Output::from("html"));
        ctx.set_header("X-Frame-Options", "sameorigin").unwrap();
        let rendered = render(ctx);
        assert_eq!(rendered.header("X-Frame-Options"), Some("sameorigin"));
    }

    #[test]
    fn test_cookies_become_set_cookie_headers() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.set_cookie(portcullis_core::SetCookie::new("foo", "bar"))
            .unwrap();
        let rendered = render(ctx);
        assert_eq!(rendered.header("Set-Cookie"), Some("foo=bar; HttpOnly"));
    }

    #[test]
    fn test_normalize_header_name() {
        assert_eq!(normalize_header_name("x-test-header"), "X-Test-Header");
        assert_eq!(normalize_header_name("CONTENT-type"), "Content-Type");
    }

    #[tokio::test]
    async fn test_default_error_output_lifts_status_and_stages_envelope() {
        let scope = RequestContext::new(Method::GET, "/missing").into_scope();
        scope.lock().set_status(StatusCode::NOT_FOUND);
        let result = default_error_output(scope.clone(), Args::new())
            .await
            .unwrap();
        assert!(
            matches!(result, Some(Output::Json(v)) if v == json!({"errors": ["Not found"]}))
        );

        let scope = RequestContext::new(Method::GET, "/").into_scope();
        let result = default_error_output(scope.clone(), Args::new())
            .await
            .unwrap();
        assert_eq!(scope.lock().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            matches!(result, Some(Output::Json(v)) if v == json!({"errors": ["Internal server error"]}))
        );
    }

    #[test]
    fn test_canned_messages() {
        assert_eq!(canned_message(StatusCode::BAD_REQUEST), "Bad request");
        assert_eq!(
            canned_message(StatusCode::UNAUTHORIZED),
            "Authentication required"
        );
        assert_eq!(canned_message(StatusCode::FORBIDDEN), "Permission denied");
        assert_eq!(canned_message(StatusCode::NOT_FOUND), "Not found");
        assert_eq!(
            canned_message(StatusCode::BAD_GATEWAY),
            "Internal server error"
        );
    }

    #[test]
    fn test_fallback_response() {
        let rendered = Rendered::fallback();
        assert_eq!(rendered.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            matches!(rendered.body, ResponseBody::Buffered(b) if b == r#"{"errors":["Internal server error"]}"#)
        );
    }
}
