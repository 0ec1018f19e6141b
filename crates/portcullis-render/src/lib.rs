//! Response serialization for Portcullis.
//!
//! Turns the staged state of a finished request run into a [`Rendered`]
//! response the transport can write: final status, normalized header list
//! and a buffered or streamed body. The built-in [`Renderer`] implements
//! the framework's serialization rules; applications can replace either
//! send slot with their own [`SendHandler`].

mod config;
mod renderer;
mod response;

pub use config::RenderConfig;
pub use renderer::{canned_message, default_error_output, normalize_header_name, Renderer};
pub use response::{Rendered, ResponseBody, SendHandler};
