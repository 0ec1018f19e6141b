//! The application surface.

use crate::config::ServerConfig;
use crate::server::{Server, ServerError};
use portcullis_core::{GateError, GateResult, Handler, Phase, RouteEntry, RouteTable};
use portcullis_pipeline::Pipeline;
use portcullis_render::{default_error_output, Renderer, SendHandler};
use portcullis_router::RoutePattern;
use std::sync::Arc;
use tokio::net::ToSocketAddrs;

/// A Portcullis application: handler registrations plus configuration.
///
/// Registrations happen before the application starts listening; calling
/// [`App::listen`] freezes them. The built-in error handler is registered
/// first, so application error handlers can overwrite what it stages.
///
/// # Example
///
/// ```no_run
/// use portcullis_core::{output, Args, Phase, Scope};
/// use portcullis_server::App;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut app = App::new();
///     app.on(
///         Phase::Process,
///         Some("GET /article/<title:string>"),
///         &["title"],
///         |_: Scope, args: Args| async move {
///             output(format!("<h1>{}</h1>", args.str("title").unwrap_or("")))
///         },
///     )?;
///     let server = app.listen("127.0.0.1:8080").await?;
///     server.wait().await;
///     Ok(())
/// }
/// ```
pub struct App {
    config: ServerConfig,
    table: RouteTable,
    send: Arc<dyn SendHandler>,
    send_error: Arc<dyn SendHandler>,
}

impl App {
    /// Creates an application with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates an application with the given configuration.
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let renderer: Arc<dyn SendHandler> =
            Arc::new(Renderer::new(config.render_config().clone()));
        let mut table = RouteTable::new();
        table.register(
            Phase::Error,
            RouteEntry {
                pattern: Arc::new(RoutePattern::match_any()),
                bindings: Arc::from(Vec::new()),
                handler: Arc::new(default_error_output),
            },
        );
        Self {
            config,
            table,
            send: Arc::clone(&renderer),
            send_error: renderer,
        }
    }

    /// Registers a handler.
    ///
    /// `spec` is a route specification such as `GET /node/<id:int>`, or
    /// `None` to match every request. `bindings` names the values the
    /// handler wants resolved, in order.
    ///
    /// # Errors
    ///
    /// Returns an error when the route specification does not compile or
    /// `phase` is internal.
    pub fn on(
        &mut self,
        phase: Phase,
        spec: Option<&str>,
        bindings: &[&str],
        handler: impl Handler + 'static,
    ) -> GateResult<&mut Self> {
        if phase.spec().internal {
            return Err(GateError::internal(format!(
                "phase {phase} is not registrable"
            )));
        }
        let pattern =
            RoutePattern::compile(spec).map_err(|e| GateError::internal(e.to_string()))?;
        self.table.register(
            phase,
            RouteEntry {
                pattern: Arc::new(pattern),
                bindings: bindings.iter().map(|s| (*s).to_string()).collect(),
                handler: Arc::new(handler),
            },
        );
        Ok(self)
    }

    /// Replaces the response serialization slot.
    pub fn set_send_handler(&mut self, handler: impl SendHandler + 'static) -> &mut Self {
        self.send = Arc::new(handler);
        self
    }

    /// Replaces the error-response serialization slot.
    pub fn set_send_error_handler(&mut self, handler: impl SendHandler + 'static) -> &mut Self {
        self.send_error = Arc::new(handler);
        self
    }

    /// Freezes the registrations and starts listening.
    ///
    /// # Errors
    ///
    /// Returns an error when the address cannot be bound.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> Result<Server, ServerError> {
        let pipeline = Pipeline::new(Arc::new(self.table), self.send, self.send_error);
        Server::bind(pipeline, self.config, addr).await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
