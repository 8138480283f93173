//! Value kinds and string coercion
//!
//! Every submitted parameter is a string. A binding declares one of four
//! kinds and the string is coerced to it right before the setter runs:
//! - `float`: decimal floating point, surrounding whitespace ignored; the
//!   only special values are `NaN` and `Infinity` (optionally signed),
//!   spelled exactly so
//! - `int`: base-10 signed 32-bit integer, optional sign, no whitespace
//! - `bool`: `true` iff the text is `"true"` ignoring ASCII case
//! - `string`: passed through unchanged
//!
//! Boolean coercion never fails: `"yes"`, `"1"` or `""` all read as
//! `false`. Callers relying on strict booleans must validate upstream.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ParamError;

/// The four coercion targets a binding can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Float,
    Int,
    Bool,
    Text,
}

impl ValueKind {
    /// Coerce `raw` into a typed value of this kind
    ///
    /// `name` only feeds the error message.
    pub fn coerce(self, name: &str, raw: &str) -> Result<ParamValue, ParamError> {
        Ok(match self {
            ValueKind::Float => ParamValue::Float(parse_float(name, raw)?),
            ValueKind::Int => ParamValue::Int(parse_int(name, raw)?),
            ValueKind::Bool => ParamValue::Bool(parse_bool(raw)),
            ValueKind::Text => ParamValue::Text(raw.to_string()),
        })
    }
}

pub fn parse_float(name: &str, raw: &str) -> Result<f64, ParamError> {
    let text = raw.trim();
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    // f64::from_str also takes "inf", "infinity" and "nan" in any case
    let special = unsigned.starts_with(|c: char| c.is_ascii_alphabetic());
    if special && unsigned != "Infinity" && unsigned != "NaN" {
        return Err(coercion_error(name, raw, ValueKind::Float));
    }
    text.parse()
        .map_err(|_| coercion_error(name, raw, ValueKind::Float))
}

pub fn parse_int(name: &str, raw: &str) -> Result<i32, ParamError> {
    raw.parse()
        .map_err(|_| coercion_error(name, raw, ValueKind::Int))
}

pub fn parse_bool(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

fn coercion_error(name: &str, raw: &str, kind: ValueKind) -> ParamError {
    ParamError::Coercion {
        name: name.to_string(),
        value: raw.to_string(),
        kind: kind.to_string(),
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Float => write!(f, "float"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::Text => write!(f, "string"),
        }
    }
}

impl FromStr for ValueKind {
    type Err = String;

    /// Accepts the kind names used in tree descriptions
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "double" | "f64" => Ok(ValueKind::Float),
            "int" | "integer" | "i32" => Ok(ValueKind::Int),
            "bool" | "boolean" => Ok(ValueKind::Bool),
            "string" | "str" | "text" => Ok(ValueKind::Text),
            _ => Err(s.to_string()),
        }
    }
}

/// A coerced parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Int(i32),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ParamValue::Float(_) => ValueKind::Float,
            ParamValue::Int(_) => ValueKind::Int,
            ParamValue::Bool(_) => ValueKind::Bool,
            ParamValue::Text(_) => ValueKind::Text,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}
