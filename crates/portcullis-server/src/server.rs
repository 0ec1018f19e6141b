//! HTTP transport.
//!
//! Built on hyper and tokio. The transport's job is to turn the wire
//! request into a [`RequestContext`], hand it to the pipeline, and write
//! the [`Rendered`] response back out. It also derives the transport
//! facts the pipeline cannot see: the peer address, whether the request
//! arrived over a secure channel, and a validated host name.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use portcullis_core::RequestContext;
use portcullis_pipeline::Pipeline;
use portcullis_render::{Rendered, ResponseBody};

use crate::config::ServerConfig;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Errors starting or running the transport.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested address.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A running application.
///
/// Dropping the handle does not stop the server; call [`Server::close`]
/// for graceful shutdown or [`Server::wait`] to block until one is
/// triggered elsewhere.
#[derive(Debug)]
pub struct Server {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
    config: ServerConfig,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Binds the listener and starts accepting connections.
    pub(crate) async fn bind(
        pipeline: Pipeline,
        config: ServerConfig,
        addr: impl ToSocketAddrs,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        let shutdown = ShutdownSignal::new();
        let tracker = ConnectionTracker::new();
        let transport = Arc::new(Transport {
            pipeline,
            trust_proxy: config.trust_proxy_enabled(),
        });

        let accept_task = {
            let shutdown = shutdown.clone();
            let tracker = tracker.clone();
            tokio::spawn(async move {
                accept_loop(listener, transport, shutdown, tracker).await;
            })
        };

        Ok(Self {
            local_addr,
            shutdown,
            tracker,
            config,
            accept_task,
        })
    }

    /// The bound address; useful when listening on port 0.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can trigger shutdown from elsewhere.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Waits until shutdown is triggered and the accept loop stops.
    pub async fn wait(self) {
        let _ = self.accept_task.await;
    }

    /// Stops accepting, waits for in-flight connections up to the
    /// configured timeout, then returns.
    pub async fn close(self) {
        self.shutdown.trigger();
        let _ = self.accept_task.await;

        let timeout = self.config.shutdown_timeout_value();
        tokio::select! {
            () = self.tracker.wait_for_drain() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    active = self.tracker.active_connections(),
                    "shutdown timeout reached"
                );
            }
        }
        tracing::info!("server stopped");
    }
}

/// What every connection task needs.
struct Transport {
    pipeline: Pipeline,
    trust_proxy: bool,
}

async fn accept_loop(
    listener: TcpListener,
    transport: Arc<Transport>,
    shutdown: ShutdownSignal,
    tracker: ConnectionTracker,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let transport = Arc::clone(&transport);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(transport, stream, peer, shutdown).await
                            {
                                tracing::debug!(%peer, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to accept connection");
                    }
                }
            }
            () = shutdown.recv() => {
                tracing::info!("shutdown signal received, no longer accepting");
                break;
            }
        }
    }
}

async fn handle_connection(
    transport: Arc<Transport>,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let transport = Arc::clone(&transport);
        async move { transport.handle_request(peer, req).await }
    });
    let conn = http1::Builder::new().serve_connection(io, service);

    tokio::select! {
        result = conn => result,
        () = shutdown.recv() => {
            tracing::debug!(%peer, "connection closed due to shutdown");
            Ok(())
        }
    }
}

impl Transport {
    async fn handle_request(
        self: Arc<Self>,
        peer: SocketAddr,
        req: Request<Incoming>,
    ) -> Result<Response<BoxBody<Bytes, io::Error>>, Infallible> {
        let started = Instant::now();
        let (parts, body) = req.into_parts();

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::error!(error = %e, "failed to collect request body");
                return Ok(to_http_response(Rendered::fallback()));
            }
        };

        let ctx = RequestContext::new(parts.method.clone(), parts.uri.path())
            .with_query_pairs(parse_query(parts.uri.query()))
            .with_cookies(parse_cookies(&parts.headers))
            .with_ip(peer.ip())
            .with_host(validated_host(&parts.headers))
            .with_secure(self.trust_proxy && forwarded_secure(&parts.headers))
            .with_headers(parts.headers);

        let line = ctx.request_line();
        let rendered = self.pipeline.run(ctx.with_body(body).into_scope()).await;

        tracing::info!(
            ip = %peer.ip(),
            %line,
            status = rendered.status.as_u16(),
            bytes = rendered.body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        Ok(to_http_response(rendered))
    }
}

/// Parses the raw query string into ordered pairs; malformed input reads
/// as no query at all.
fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .unwrap_or_default()
}

/// Parses the `Cookie` header; the first occurrence of a name wins.
fn parse_cookies(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();
    let Some(raw) = headers.get(http::header::COOKIE).and_then(|v| v.to_str().ok()) else {
        return cookies;
    };
    for pair in raw.split(';') {
        if let Some((name, value)) = pair.trim().split_once('=') {
            cookies
                .entry(name.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }
    }
    cookies
}

/// True when a trusted proxy says the request arrived over HTTPS.
///
/// Only the first forwarded protocol counts, and quotes some proxies add
/// are stripped.
fn forwarded_secure(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().trim_matches('"'))
        .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

/// Returns the lowercased `Host` header when it looks like a real host
/// name; anything else reads as absent.
fn validated_host(headers: &HeaderMap) -> Option<String> {
    static HOST_PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = HOST_PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9.-]*(:[0-9]+)?$").expect("static pattern compiles")
    });
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())?
        .to_ascii_lowercase();
    pattern.is_match(&host).then_some(host)
}

/// Converts a rendered response into the hyper representation.
fn to_http_response(rendered: Rendered) -> Response<BoxBody<Bytes, io::Error>> {
    let mut builder = Response::builder().status(rendered.status);
    for (name, value) in &rendered.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => builder = builder.header(name, value),
            _ => tracing::warn!(header = %name, "dropping unrepresentable header"),
        }
    }
    let body = match rendered.body {
        ResponseBody::Buffered(bytes) => Full::new(bytes)
            .map_err(|never| match never {})
            .boxed(),
        ResponseBody::Streamed(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed(),
    };
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to assemble response");
        let mut response = Response::new(
            Full::new(Bytes::new())
                .map_err(|never| match never {})
                .boxed(),
        );
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
