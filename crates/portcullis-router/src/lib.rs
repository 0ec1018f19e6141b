//! Typed path routing for Portcullis.
//!
//! This crate provides the two leaf components of the request-processing
//! core:
//!
//! - the **type grammar** ([`ParamType`], [`ParamValue`]): a fixed mapping
//!   from type names to a matching pattern and a value-conversion rule;
//! - the **path compiler** ([`RoutePattern`]): turns a route specification
//!   string such as `GET /node/by-int/<id:int>` into a case-insensitive,
//!   fully anchored matcher over `"<METHOD> <path>"` plus an ordered list
//!   of named, typed parameter descriptors.
//!
//! # Example
//!
//! ```rust
//! use portcullis_router::{ParamType, RoutePattern};
//!
//! let pattern = RoutePattern::compile(Some("GET /article/<title:string>")).unwrap();
//! assert!(pattern.is_match("GET /article/testarticle"));
//! assert!(!pattern.is_match("GET /article/lorem/ipsum"));
//! assert_eq!(pattern.params()[0].name, "title");
//! assert_eq!(pattern.params()[0].ty, ParamType::String);
//! ```

mod params;
mod pattern;
mod types;

pub use params::PathParams;
pub use pattern::{canonicalize_path, request_line, ParamSpec, RoutePattern};
pub use types::{ParamType, ParamValue};

use thiserror::Error;

/// Errors raised while compiling a route specification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// A placeholder referenced a type name outside the grammar.
    #[error("Unknown type {0}")]
    UnknownType(String),

    /// A placeholder segment was not of the form `<name:type>`.
    #[error("Invalid placeholder segment '{0}'")]
    InvalidPlaceholder(String),

    /// The same parameter name appeared twice in one specification.
    #[error("Duplicate parameter name '{0}'")]
    DuplicateParam(String),

    /// The assembled expression failed to compile.
    #[error("Invalid route specification: {0}")]
    Pattern(String),
}
