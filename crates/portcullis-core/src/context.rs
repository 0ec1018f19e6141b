//! The per-request context.
//!
//! One [`RequestContext`] exists per request run. The transport fills in
//! the request-description fields before the run starts; handlers read
//! them, stage response state (status, mime, headers, cookies, output) and
//! may register request-scoped routes. The renderer consumes the staged
//! state at the end of the run.
//!
//! Handlers share the context through [`Scope`], an
//! `Arc<parking_lot::Mutex<RequestContext>>`. Lock it, read or stage, and
//! release before awaiting; fan-out phases run handlers concurrently
//! against the same scope.

use crate::{GateError, GateResult, Handler, Output, Phase, RouteEntry, RouteTable, SetCookie};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use indexmap::IndexMap;
use parking_lot::Mutex;
use portcullis_router::{canonicalize_path, ParamType, ParamValue, PathParams, RoutePattern};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

/// Shared handle to the request context.
pub type Scope = Arc<Mutex<RequestContext>>;

/// A header staged for the response.
#[derive(Debug, Clone)]
pub struct StagedHeader {
    /// Header name as staged.
    pub name: String,
    /// Header value.
    pub value: String,
    /// True when this entry adds to earlier values instead of replacing
    /// them.
    pub append: bool,
}

/// The state of one request run.
#[derive(Debug)]
pub struct RequestContext {
    // Request description, fixed once the run starts.
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    cookies: IndexMap<String, String>,
    ip: Option<IpAddr>,
    date: SystemTime,
    host: Option<String>,
    secure: bool,
    body: Bytes,

    // Response staging.
    status: StatusCode,
    mime: Option<String>,
    output: Option<Output>,
    staged_headers: Vec<StagedHeader>,
    cookies_out: Vec<SetCookie>,
    error: Option<GateError>,

    // Parameters.
    path_params: PathParams,
    extra_params: IndexMap<String, ParamValue>,

    // Request-scoped route registrations.
    overlay: RouteTable,
}

impl RequestContext {
    /// Creates a context for a request line; the path is canonicalized
    /// (trailing slashes trimmed).
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: canonicalize_path(path),
            query: Vec::new(),
            headers: HeaderMap::new(),
            cookies: IndexMap::new(),
            ip: None,
            date: SystemTime::now(),
            host: None,
            secure: false,
            body: Bytes::new(),
            status: StatusCode::OK,
            mime: None,
            output: None,
            staged_headers: Vec::new(),
            cookies_out: Vec::new(),
            error: None,
            path_params: PathParams::new(),
            extra_params: IndexMap::new(),
            overlay: RouteTable::new(),
        }
    }

    /// Sets the parsed query pairs.
    #[must_use]
    pub fn with_query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs;
        self
    }

    /// Sets the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the parsed request cookies.
    #[must_use]
    pub fn with_cookies(mut self, cookies: IndexMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Sets the validated host name.
    #[must_use]
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    /// Marks the request as having arrived over a secure channel.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the collected request body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Wraps the context into a shared [`Scope`].
    #[must_use]
    pub fn into_scope(self) -> Scope {
        Arc::new(Mutex::new(self))
    }

    /// The request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The canonical request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The line route patterns match against.
    #[must_use]
    pub fn request_line(&self) -> String {
        portcullis_router::request_line(self.method.as_str(), &self.path)
    }

    /// The peer address.
    #[must_use]
    pub const fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// The moment the request was accepted.
    #[must_use]
    pub const fn date(&self) -> SystemTime {
        self.date
    }

    /// The validated host name, when the request carried a usable one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// True when the request arrived over a secure channel (directly or
    /// via a trusted forwarding proxy).
    #[must_use]
    pub const fn secure(&self) -> bool {
        self.secure
    }

    /// The collected request body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns a request header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The full request header map.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a typed query value.
    ///
    /// The first pair with this name is validated and converted through
    /// the type grammar; mismatches read as absent.
    #[must_use]
    pub fn get_query(&self, name: &str, ty: ParamType) -> Option<ParamValue> {
        let raw = self
            .query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())?;
        ty.parse(raw)
    }

    /// Returns a typed query value, or `default` when absent or invalid.
    #[must_use]
    pub fn get_query_or(&self, name: &str, ty: ParamType, default: ParamValue) -> ParamValue {
        self.get_query(name, ty).unwrap_or(default)
    }

    /// Lists the query parameter names, in order, without duplicates.
    #[must_use]
    pub fn query_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.query {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Returns a typed cookie value.
    #[must_use]
    pub fn get_cookie(&self, name: &str, ty: ParamType) -> Option<ParamValue> {
        self.cookies.get(name).and_then(|raw| ty.parse(raw))
    }

    /// Returns a typed cookie value, or `default` when absent or invalid.
    #[must_use]
    pub fn get_cookie_or(&self, name: &str, ty: ParamType, default: ParamValue) -> ParamValue {
        self.get_cookie(name, ty).unwrap_or(default)
    }

    /// Lists the cookie names, in order.
    #[must_use]
    pub fn cookie_names(&self) -> Vec<&str> {
        self.cookies.keys().map(String::as_str).collect()
    }

    /// The staged response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stages the response status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// The staged content type, if any.
    #[must_use]
    pub fn mime(&self) -> Option<&str> {
        self.mime.as_deref()
    }

    /// Stages the response content type; overrides the default the output
    /// variant would imply.
    pub fn set_mime(&mut self, mime: impl Into<String>) {
        self.mime = Some(mime.into());
    }

    /// The staged output, if any.
    #[must_use]
    pub const fn output(&self) -> Option<&Output> {
        self.output.as_ref()
    }

    /// Stages the response output.
    pub fn set_output(&mut self, output: Output) {
        self.output = Some(output);
    }

    /// Removes and returns the staged output.
    pub fn take_output(&mut self) -> Option<Output> {
        self.output.take()
    }

    /// Stages a response header, replacing earlier stagings of the same
    /// name.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::IllegalHeader`] when the name or value carries
    /// characters outside printable ASCII, which would corrupt the
    /// response.
    pub fn set_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> GateResult<()> {
        self.stage_header(name.into(), value.into(), false)
    }

    /// Stages a response header without replacing earlier values; the
    /// header is sent once per staged value.
    ///
    /// # Errors
    ///
    /// Same validation as [`RequestContext::set_header`].
    pub fn append_header(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> GateResult<()> {
        self.stage_header(name.into(), value.into(), true)
    }

    fn stage_header(&mut self, name: String, value: String, append: bool) -> GateResult<()> {
        if !is_printable_ascii(&name) || !is_printable_ascii(&value) {
            return Err(GateError::illegal_header(name));
        }
        if !append {
            self.staged_headers
                .retain(|h| !h.name.eq_ignore_ascii_case(&name));
        }
        self.staged_headers.push(StagedHeader {
            name,
            value,
            append,
        });
        Ok(())
    }

    /// The headers staged so far, in staging order.
    #[must_use]
    pub fn staged_headers(&self) -> &[StagedHeader] {
        &self.staged_headers
    }

    /// Stages an outgoing cookie.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::IllegalCookie`] when the cookie fails
    /// validation.
    pub fn set_cookie(&mut self, cookie: SetCookie) -> GateResult<()> {
        cookie.validate()?;
        self.cookies_out.push(cookie);
        Ok(())
    }

    /// The cookies staged so far.
    #[must_use]
    pub fn staged_cookies(&self) -> &[SetCookie] {
        &self.cookies_out
    }

    /// Sets an extra parameter, shadowing any path parameter of the same
    /// name for subsequent bindings.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.extra_params.insert(name.into(), value.into());
    }

    /// Looks up a parameter: extra parameters shadow path parameters.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.extra_params
            .get(name)
            .or_else(|| self.path_params.get(name))
    }

    /// The extra parameters set so far.
    #[must_use]
    pub const fn extra_params(&self) -> &IndexMap<String, ParamValue> {
        &self.extra_params
    }

    /// The parameters extracted by the most recent route binding.
    #[must_use]
    pub const fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    /// Replaces the mirrored path parameters; called by the binder before
    /// each handler.
    pub fn set_path_params(&mut self, params: PathParams) {
        self.path_params = params;
    }

    /// The error carried by the run, once it has diverted onto the error
    /// track.
    #[must_use]
    pub const fn error(&self) -> Option<&GateError> {
        self.error.as_ref()
    }

    /// Records the error diverting the run.
    pub fn set_error(&mut self, error: GateError) {
        self.error = Some(error);
    }

    /// Registers a handler for this request only.
    ///
    /// Request-scoped entries run after the application's own entries for
    /// the same phase and are discarded when the run ends.
    ///
    /// # Errors
    ///
    /// Returns an error when the route specification does not compile or
    /// when `phase` is internal.
    pub fn on(
        &mut self,
        phase: Phase,
        spec: Option<&str>,
        bindings: &[&str],
        handler: impl Handler + 'static,
    ) -> GateResult<()> {
        if phase.spec().internal {
            return Err(GateError::internal(format!(
                "phase {phase} is not registrable"
            )));
        }
        let pattern = RoutePattern::compile(spec)
            .map_err(|e| GateError::internal(e.to_string()))?;
        self.overlay.register(
            phase,
            RouteEntry {
                pattern: Arc::new(pattern),
                bindings: bindings.iter().map(|s| (*s).to_string()).collect(),
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// The request-scoped route registrations.
    #[must_use]
    pub const fn overlay(&self) -> &RouteTable {
        &self.overlay
    }
}

/// Header names and values are restricted to printable ASCII; anything
/// else (newlines in particular) could split the response.
fn is_printable_ascii(text: &str) -> bool {
    text.bytes().all(|b| (0x20..=0x7e).contains(&b))
}
