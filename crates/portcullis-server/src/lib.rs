//! HTTP transport and application surface for Portcullis.
//!
//! [`App`] is where handlers are registered; [`App::listen`] freezes the
//! registrations and starts a hyper/tokio server that runs every request
//! through the phase pipeline. [`ShutdownSignal`] coordinates graceful
//! shutdown.

mod app;
mod config;
mod logging;
mod server;
mod shutdown;

pub use app::App;
pub use config::ServerConfig;
pub use logging::init_logging;
pub use server::{Server, ServerError};
pub use shutdown::{ConnectionTracker, ConnectionToken, ShutdownSignal};
