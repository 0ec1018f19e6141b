//! The fixed type grammar for dynamic path segments.
//!
//! Every placeholder in a route specification names one of these types.
//! A type contributes two things: a matching pattern (embedded into the
//! compiled route expression) and a conversion rule from the raw matched
//! text to a [`ParamValue`].

use crate::RouteError;
use serde::Serialize;
use uuid::Uuid;

/// Parameter types accepted in `<name:type>` placeholders.
///
/// | type | accepted pattern | conversion |
/// |---|---|---|
/// | `string` | one or more non-slash chars | identity |
/// | `alpha` | letters only | identity |
/// | `alphanum` | letters and digits | identity |
/// | `int` | positive, no leading zero | number |
/// | `signed` | optional `-`, digits | number |
/// | `unsigned` | digits, allows `0` | number |
/// | `float` | optional `-`, digits and dot | number |
/// | `bool` | `1`, `0`, `true`, `false` | boolean |
/// | `uuid` | canonical 8-4-4-4-12 hex | lowercased uuid |
/// | `path` | anything, may contain slashes | identity |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// One or more characters, excluding `/`.
    String,
    /// Letters only.
    Alpha,
    /// Letters and digits.
    Alphanum,
    /// Positive integer without leading zero (rejects `0` and signs).
    Int,
    /// Integer with an optional leading `-`.
    Signed,
    /// Non-negative integer, `0` allowed.
    Unsigned,
    /// Decimal number, optional `-`, leading-dot decimals allowed.
    Float,
    /// Literally `1`, `0`, `true` or `false`.
    Bool,
    /// Canonical hyphenated UUID.
    Uuid,
    /// One or more of any character, may span multiple segments.
    Path,
}

impl ParamType {
    /// Resolves a type name from a route specification.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnknownType`] for names outside the grammar.
    pub fn from_name(name: &str) -> Result<Self, RouteError> {
        match name {
            "string" => Ok(Self::String),
            "alpha" => Ok(Self::Alpha),
            "alphanum" => Ok(Self::Alphanum),
            "int" => Ok(Self::Int),
            "signed" => Ok(Self::Signed),
            "unsigned" => Ok(Self::Unsigned),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "uuid" => Ok(Self::Uuid),
            "path" => Ok(Self::Path),
            other => Err(RouteError::UnknownType(other.to_string())),
        }
    }

    /// Returns the grammar name of this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Alpha => "alpha",
            Self::Alphanum => "alphanum",
            Self::Int => "int",
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Uuid => "uuid",
            Self::Path => "path",
        }
    }

    /// Returns the expression fragment matched by this type.
    ///
    /// Fragments are embedded as a single capture group inside a
    /// case-insensitive anchored expression, so `[a-z]` also accepts
    /// uppercase letters.
    #[must_use]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::String => "[^/]+",
            Self::Alpha => "[a-z]+",
            Self::Alphanum => "[a-z0-9]+",
            Self::Int => "[1-9][0-9]*",
            Self::Signed => "-?[0-9]+",
            Self::Unsigned => "[0-9]+",
            Self::Float => "-?[0-9.]+",
            Self::Bool => "1|0|true|false",
            Self::Uuid => "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            Self::Path => ".+?",
        }
    }

    /// Returns true when `raw` fully matches this type's pattern.
    ///
    /// Mirrors [`ParamType::pattern`] without compiling a throwaway
    /// expression; used for query and cookie values which never go through
    /// the path compiler.
    #[must_use]
    pub fn is_match(self, raw: &str) -> bool {
        match self {
            Self::String => !raw.is_empty() && !raw.contains('/'),
            Self::Alpha => !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphabetic()),
            Self::Alphanum => !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric()),
            Self::Int => {
                let mut chars = raw.chars();
                matches!(chars.next(), Some('1'..='9')) && chars.all(|c| c.is_ascii_digit())
            }
            Self::Signed => {
                let digits = raw.strip_prefix('-').unwrap_or(raw);
                !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
            }
            Self::Unsigned => !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()),
            Self::Float => {
                let rest = raw.strip_prefix('-').unwrap_or(raw);
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
            }
            Self::Bool => matches!(
                raw.to_ascii_lowercase().as_str(),
                "1" | "0" | "true" | "false"
            ),
            Self::Uuid => is_canonical_uuid(raw),
            Self::Path => !raw.is_empty(),
        }
    }

    /// Applies this type's conversion rule to already-matched text.
    ///
    /// Returns `None` when the text cannot be represented (for example a
    /// float pattern match such as `1.2.3` that is not a number); callers
    /// treat that as a non-match.
    #[must_use]
    pub fn convert(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::String | Self::Alpha | Self::Alphanum | Self::Path => {
                Some(ParamValue::Str(raw.to_string()))
            }
            Self::Int | Self::Signed | Self::Unsigned => raw.parse().ok().map(ParamValue::Int),
            Self::Float => raw.parse().ok().map(ParamValue::Float),
            Self::Bool => Some(ParamValue::Bool(matches!(
                raw.to_ascii_lowercase().as_str(),
                "1" | "true"
            ))),
            Self::Uuid => Uuid::try_parse(raw).ok().map(ParamValue::Uuid),
        }
    }

    /// Validates and converts a standalone value (query string, cookie).
    ///
    /// Combines [`ParamType::is_match`] and [`ParamType::convert`].
    #[must_use]
    pub fn parse(self, raw: &str) -> Option<ParamValue> {
        if self.is_match(raw) {
            self.convert(raw)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Checks the canonical 8-4-4-4-12 hyphenated form.
///
/// `Uuid::try_parse` also accepts braced, simple and urn forms, which the
/// grammar does not.
fn is_canonical_uuid(raw: &str) -> bool {
    if raw.len() != 36 {
        return false;
    }
    raw.char_indices().all(|(i, c)| match i {
        8 | 13 | 18 | 23 => c == '-',
        _ => c.is_ascii_hexdigit(),
    })
}

/// A converted parameter value.
///
/// Produced by the type grammar from matched path segments, query values
/// and cookie values, and by handlers through the extra-parameters map.
/// Serializes transparently (`Str("a")` becomes `"a"`, `Int(1)` becomes
/// `1`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Identity-converted text.
    Str(String),
    /// `int`, `signed` and `unsigned` conversions.
    Int(i64),
    /// `float` conversion.
    Float(f64),
    /// `bool` conversion.
    Bool(bool),
    /// `uuid` conversion; serializes as the lowercase canonical form.
    Uuid(Uuid),
}

impl ParamValue {
    /// Returns the text for `Str` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number for `Int` values.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the number for `Float` (or `Int`) values.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the flag for `Bool` values.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the uuid for `Uuid` values.
    #[must_use]
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Uuid> for ParamValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}
