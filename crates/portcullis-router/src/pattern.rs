//! Route-specification compiler.
//!
//! A route specification is a string of the form `"<METHOD> /path"` where
//! path segments are either literal text or `<name:type>` placeholders.
//! Compilation produces a single anchored, case-insensitive expression over
//! the request line (`"<METHOD> <canonical path>"`) and an ordered list of
//! parameter descriptors aligned with the capture groups.

use crate::{ParamType, RouteError};
use regex::Regex;

/// A named, typed parameter declared by a placeholder segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Placeholder name, as written in the route specification.
    pub name: String,
    /// Resolved parameter type.
    pub ty: ParamType,
}

/// A compiled route pattern.
///
/// Matches against the request line produced by [`request_line`]. `None`
/// specifications compile to a match-everything pattern with no parameters.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    regex: Regex,
    params: Vec<ParamSpec>,
}

impl RoutePattern {
    /// Compiles a route specification.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] for unknown type names, malformed
    /// placeholders or duplicate parameter names.
    pub fn compile(spec: Option<&str>) -> Result<Self, RouteError> {
        let Some(spec) = spec else {
            return Ok(Self::match_any());
        };

        let mut params: Vec<ParamSpec> = Vec::new();
        let mut expression = String::from("(?i)^");
        let mut first = true;
        for segment in spec.split('/') {
            if !first {
                expression.push('/');
            }
            first = false;
            if segment.starts_with('<') || segment.ends_with('>') {
                let spec = parse_placeholder(segment)?;
                if params.iter().any(|p| p.name == spec.name) {
                    return Err(RouteError::DuplicateParam(spec.name));
                }
                expression.push('(');
                expression.push_str(spec.ty.pattern());
                expression.push(')');
                params.push(spec);
            } else {
                expression.push_str(&regex::escape(segment));
            }
        }
        expression.push('$');

        let regex = Regex::new(&expression).map_err(|e| RouteError::Pattern(e.to_string()))?;
        Ok(Self { regex, params })
    }

    /// The pattern that matches every request line, with no parameters.
    #[must_use]
    pub fn match_any() -> Self {
        Self {
            regex: Regex::new("(?s)^.*$").expect("static pattern compiles"),
            params: Vec::new(),
        }
    }

    /// Returns true when the request line matches this pattern.
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Captures the raw text of each placeholder, in declaration order.
    ///
    /// Returns `None` when the line does not match.
    #[must_use]
    pub fn captures<'a>(&self, line: &'a str) -> Option<Vec<&'a str>> {
        let caps = self.regex.captures(line)?;
        Some(
            (1..=self.params.len())
                .filter_map(|i| caps.get(i).map(|m| m.as_str()))
                .collect(),
        )
    }

    /// The declared parameters, aligned with [`RoutePattern::captures`].
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

/// Parses one `<name:type>` placeholder segment.
fn parse_placeholder(segment: &str) -> Result<ParamSpec, RouteError> {
    let inner = segment
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .ok_or_else(|| RouteError::InvalidPlaceholder(segment.to_string()))?;
    let (name, ty_name) = inner
        .split_once(':')
        .ok_or_else(|| RouteError::InvalidPlaceholder(segment.to_string()))?;
    if !is_valid_param_name(name) {
        return Err(RouteError::InvalidPlaceholder(segment.to_string()));
    }
    Ok(ParamSpec {
        name: name.to_string(),
        ty: ParamType::from_name(ty_name)?,
    })
}

/// A parameter name starts with a letter and continues with letters or
/// digits, any case.
fn is_valid_param_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Builds the line compiled patterns match against.
#[must_use]
pub fn request_line(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

/// Canonicalizes a request path: trailing slashes are trimmed, with the
/// bare root kept as `/`.
#[must_use]
pub fn canonicalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
