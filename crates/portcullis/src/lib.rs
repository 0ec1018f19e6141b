//! # Portcullis
//!
//! **Minimalist HTTP server framework with a fixed, named-phase request
//! pipeline**
//!
//! Every request walks the same ordered phases (initialize,
//! authentication, authorisation, validation, process, postprocess, send,
//! after), with a parallel error track that takes over when a handler
//! fails. Handlers attach to a phase with a typed route specification and
//! a list of parameter names they want bound:
//!
//! ```no_run
//! use portcullis::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::new();
//!     app.on(
//!         Phase::Process,
//!         Some("GET /article/<title:string>"),
//!         &["title"],
//!         |_: Scope, args: Args| async move {
//!             output(format!("<h1>{}</h1>", args.str("title").unwrap_or("")))
//!         },
//!     )?;
//!     let server = app.listen("127.0.0.1:8080").await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! Route placeholders are typed (`string`, `alpha`, `alphanum`, `int`,
//! `signed`, `unsigned`, `float`, `bool`, `uuid`, `path`); a segment that
//! fails its type's pattern or conversion simply does not match, and the
//! request falls through to the next registration.

pub use portcullis_core as core;
pub use portcullis_pipeline as pipeline;
pub use portcullis_render as render;
pub use portcullis_router as router;
pub use portcullis_server as server;

/// Convenient imports for applications.
///
/// ```
/// use portcullis::prelude::*;
/// ```
pub mod prelude {
    pub use portcullis_core::{
        done, output, Args, GateError, GateResult, Output, Phase, RequestContext, Scope,
        SetCookie,
    };
    pub use portcullis_render::RenderConfig;
    pub use portcullis_router::{ParamType, ParamValue};
    pub use portcullis_server::{App, Server, ServerConfig, ShutdownSignal};
}
