//! Parameter binding.
//!
//! Binding happens in two steps. First a route entry is matched against
//! the request line: every capture is percent-decoded and converted
//! through its declared type; any failure makes the whole entry a
//! non-match, so the walk falls through to the next entry. Second, the
//! handler's declared binding names are resolved against the request
//! state, in a fixed precedence order.

use portcullis_core::{Args, Bound, RouteEntry, Scope};
use portcullis_router::PathParams;
use std::sync::Arc;

/// Names that resolve to the request scope when nothing shadows them.
const SCOPE_NAMES: [&str; 2] = ["request", "context"];

/// Matches an entry against a request line and extracts its parameters.
///
/// Returns `None` when the pattern does not match, when a capture carries
/// a malformed percent-escape, or when a decoded capture fails its type
/// conversion.
#[must_use]
pub fn bind_entry(entry: &RouteEntry, line: &str) -> Option<PathParams> {
    let captures = entry.pattern.captures(line)?;
    let specs = entry.pattern.params();
    if captures.len() != specs.len() {
        return None;
    }
    let mut params = PathParams::new();
    for (spec, raw) in specs.iter().zip(captures) {
        if !escapes_well_formed(raw) {
            return None;
        }
        let decoded = urlencoding::decode(raw).ok()?;
        let value = spec.ty.convert(&decoded)?;
        params.insert(spec.name.clone(), value);
    }
    Some(params)
}

/// Returns true when every `%` in `raw` starts a two-hex-digit escape.
///
/// The decoder passes malformed escapes through verbatim, so they have to
/// be rejected up front to keep the entry a non-match.
fn escapes_well_formed(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len()
                || !bytes[i + 1].is_ascii_hexdigit()
                || !bytes[i + 2].is_ascii_hexdigit()
            {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Resolves a handler's declared binding names.
///
/// Precedence per name: extra parameters set during the run, then the
/// entry's path parameters, then the scope names `request` and `context`,
/// then absent. A path parameter named `request` therefore shadows the
/// scope binding.
#[must_use]
pub fn resolve_args(scope: &Scope, bindings: &[String], params: &PathParams) -> Args {
    let ctx = scope.lock();
    let mut args = Args::new();
    for name in bindings {
        let bound = if let Some(value) = ctx.extra_params().get(name) {
            Bound::Value(value.clone())
        } else if let Some(value) = params.get(name) {
            Bound::Value(value.clone())
        } else if SCOPE_NAMES.contains(&name.as_str()) {
            Bound::Context(Arc::clone(scope))
        } else {
            Bound::Absent
        };
        args.push(name.clone(), bound);
    }
    args
}
