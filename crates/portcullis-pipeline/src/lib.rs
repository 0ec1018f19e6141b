//! Request execution for Portcullis.
//!
//! This crate drives a request through the fixed phase table: the
//! [`Pipeline`] walks the phases, the binder matches route entries and
//! resolves each handler's declared bindings, and the configured send
//! slots serialize the outcome.

mod binder;
mod executor;

pub use binder::{bind_entry, resolve_args};
pub use executor::Pipeline;
