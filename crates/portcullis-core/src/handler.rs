//! The handler trait and its argument binding types.
//!
//! Handlers attach to phases and receive two things: the shared request
//! [`Scope`](crate::Scope) and an [`Args`] set holding the values resolved
//! for the parameter names the handler declared at registration.

use crate::{GateError, Output, Scope};
use portcullis_router::ParamValue;
use std::future::Future;
use std::pin::Pin;

/// A boxed future produced by a handler.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// What a handler run yields: optionally a new output, or an error that
/// diverts the run onto the error track.
pub type HandlerResult = Result<Option<Output>, GateError>;

/// One resolved binding.
#[derive(Clone)]
pub enum Bound {
    /// The declared name referred to the request scope itself.
    Context(Scope),
    /// A converted parameter value.
    Value(ParamValue),
    /// Nothing matched the declared name.
    Absent,
}

impl std::fmt::Debug for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Context(_) => f.write_str("Context(..)"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// The bindings resolved for one handler invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    entries: Vec<(String, Bound)>,
}

impl Args {
    /// Creates an empty binding set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolved binding.
    pub fn push(&mut self, name: impl Into<String>, bound: Bound) {
        self.entries.push((name.into(), bound));
    }

    /// Looks up a binding by declared name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Bound> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Returns the parameter value bound to `name`, if any.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        match self.get(name) {
            Some(Bound::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Returns the text bound to `name`, if it is a string value.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(ParamValue::as_str)
    }

    /// Returns the integer bound to `name`, if it is a number.
    #[must_use]
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(ParamValue::as_i64)
    }

    /// Returns the scope bound to `name`, if the name resolved to the
    /// request scope.
    #[must_use]
    pub fn scope(&self, name: &str) -> Option<&Scope> {
        match self.get(name) {
            Some(Bound::Context(scope)) => Some(scope),
            _ => None,
        }
    }

    /// Iterates bindings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bound)> {
        self.entries.iter().map(|(n, b)| (n.as_str(), b))
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no bindings were declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A phase handler.
///
/// Implemented for any `Fn(Scope, Args) -> impl Future<Output = HandlerResult>`
/// closure, so most handlers are written as plain async closures:
///
/// ```
/// use portcullis_core::{output, Args, Scope};
///
/// let handler = |_scope: Scope, args: Args| async move {
///     let title = args.str("title").unwrap_or("untitled").to_string();
///     output(format!("<h1>{title}</h1>"))
/// };
/// # let _ = handler;
/// ```
pub trait Handler: Send + Sync {
    /// Runs the handler.
    fn call(&self, scope: Scope, args: Args) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Scope, Args) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, scope: Scope, args: Args) -> BoxFuture<HandlerResult> {
        Box::pin(self(scope, args))
    }
}

/// Convenience for handlers that produce content.
pub fn output(value: impl Into<Output>) -> HandlerResult {
    Ok(Some(value.into()))
}

/// Convenience for handlers that only have side effects.
#[must_use]
pub const fn done() -> HandlerResult {
    Ok(None)
}
