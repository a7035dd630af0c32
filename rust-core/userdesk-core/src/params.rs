//! # Path Parameters
//!
//! Typed path parameters declared in route patterns (`/users/{id:int}`).
//!
//! A segment that fails conversion is kept as [`ParamValue::Str`] so the
//! handler decides how to answer (usually 422), instead of the router
//! pretending the route does not exist.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Declared kind of a path parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamKind {
    /// No conversion
    #[default]
    Str,
    /// Parsed to i64
    Int,
    /// Parsed from "true"/"false", "1"/"0" or "yes"/"no"
    Bool,
}

impl ParamKind {
    /// Parse the specifier after the colon in `{name:spec}`
    #[must_use]
    pub fn from_specifier(spec: &str) -> Self {
        match spec.to_ascii_lowercase().as_str() {
            "int" | "integer" | "i64" => Self::Int,
            "bool" | "boolean" => Self::Bool,
            _ => Self::Str,
        }
    }

    /// Name used in error messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Converted parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Unconverted (or failed conversion) value
    Str(String),
    /// Integer value
    Int(i64),
    /// Boolean value
    Bool(bool),
}

impl ParamValue {
    /// Integer payload, if any
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload, if any
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload, if any
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Convert a raw segment according to its declared kind
///
/// # Errors
///
/// Returns `Error::InvalidParam` if the segment does not parse.
pub fn convert(raw: &str, kind: ParamKind) -> Result<ParamValue> {
    let invalid = || Error::InvalidParam {
        value: raw.to_string(),
        expected: kind.name(),
    };

    match kind {
        ParamKind::Str => Ok(ParamValue::Str(raw.to_string())),
        ParamKind::Int => raw.parse::<i64>().map(ParamValue::Int).map_err(|_| invalid()),
        ParamKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(ParamValue::Bool(true)),
            "false" | "0" | "no" => Ok(ParamValue::Bool(false)),
            _ => Err(invalid()),
        },
    }
}

/// Split a `{name}` or `{name:kind}` segment
///
/// Returns `None` for static segments.
#[must_use]
pub fn parse_segment(segment: &str) -> Option<(String, ParamKind)> {
    let inner = segment.strip_prefix('{')?.strip_suffix('}')?;
    match inner.split_once(':') {
        Some((name, spec)) => Some((name.to_string(), ParamKind::from_specifier(spec))),
        None => Some((inner.to_string(), ParamKind::Str)),
    }
}

/// Path parameters extracted for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    values: HashMap<String, ParamValue>,
}

impl PathParams {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Integer value by name; `None` if missing or not an integer
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_int)
    }

    /// Boolean value by name
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ParamValue::as_bool)
    }

    /// Value rendered back to text
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<String> {
        self.get(name).map(ToString::to_string)
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the route declared no parameters
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
