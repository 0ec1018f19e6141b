//! Core types for the Portcullis framework.
//!
//! This crate holds everything the pipeline, renderer and transport share:
//!
//! - [`RequestContext`] / [`Scope`]: the per-request state handlers read
//!   and stage responses into;
//! - [`Phase`] and the frozen [`PHASES`] table: the fixed, named phases
//!   every request walks in order;
//! - [`Handler`], [`Args`] and [`Output`]: the handler contract;
//! - [`RouteTable`]: per-phase, registration-ordered handler entries;
//! - [`GateError`]: the error type that diverts a run onto the error
//!   track;
//! - [`SetCookie`]: outgoing cookie construction.

mod context;
mod cookie;
mod error;
mod handler;
mod output;
mod phase;
mod table;

pub use context::{RequestContext, Scope, StagedHeader};
pub use cookie::SetCookie;
pub use error::{ErrorKind, GateError, GateResult};
pub use handler::{done, output, Args, Bound, BoxFuture, Handler, HandlerResult};
pub use output::{BodyStream, Output};
pub use phase::{ConcurrencyPolicy, Phase, PhaseSpec, PHASES};
pub use table::{RouteEntry, RouteTable};
