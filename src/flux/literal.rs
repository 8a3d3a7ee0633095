//! Flux literal values
//!
//! Every value that appears on the right-hand side of a row comparison is
//! resolved into a [`Literal`] when the comparison is built. Each variant has
//! exactly one rendering rule, so a value that has no Flux form is rejected up
//! front instead of producing broken query text later.

use crate::error::{FluxError, FluxResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Flux duration literal such as `-1h`, `30m` or `1d12h`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FluxDuration(String);

impl FluxDuration {
    /// Parse and validate a duration literal
    pub fn parse(s: &str) -> FluxResult<Self> {
        let re = regex::Regex::new(r"^-?(\d+(ns|us|µs|ms|mo|s|m|h|d|w|y))+$")
            .map_err(|e| FluxError::unsupported("duration", e.to_string()))?;

        let trimmed = s.trim();
        if re.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(FluxError::unsupported(
                "duration",
                format!("`{}` is not a Flux duration literal", s),
            ))
        }
    }

    /// Whether the duration points into the past
    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FluxDuration {
    type Error = FluxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FluxDuration> for String {
    fn from(d: FluxDuration) -> Self {
        d.0
    }
}

impl From<chrono::Duration> for FluxDuration {
    fn from(d: chrono::Duration) -> Self {
        match d.num_nanoseconds() {
            Some(ns) if ns % 1_000_000_000 != 0 => Self(format!("{}ns", ns)),
            _ => Self(format!("{}s", d.num_seconds())),
        }
    }
}

impl fmt::Display for FluxDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A literal value in a Flux expression
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Double-quoted string
    String(String),
    /// Signed 64-bit integer
    Int(i64),
    /// Unsigned 64-bit integer, rendered through `uint()`
    UInt(u64),
    /// Finite floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Absolute point in time, rendered as RFC3339
    Time(DateTime<Utc>),
    /// Relative duration
    Duration(FluxDuration),
}

impl Literal {
    /// Name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "uint(v: {})", v),
            Self::Float(v) => {
                let text = v.to_string();
                if text.contains('.') {
                    f.write_str(&text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Self::Bool(v) => write!(f, "{}", v),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Duration(d) => write!(f, "{}", d),
        }
    }
}

/// Escape text for use inside a double-quoted Flux string
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // `${` starts string interpolation
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }

    out
}

/// Conversion into a [`Literal`], checked when the comparison is constructed
pub trait ToLiteral {
    fn to_literal(self) -> FluxResult<Literal>;
}

impl ToLiteral for Literal {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(self)
    }
}

impl ToLiteral for &str {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::String(self.to_string()))
    }
}

impl ToLiteral for String {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::String(self))
    }
}

impl ToLiteral for &String {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::String(self.clone()))
    }
}

macro_rules! int_literal {
    ($($t:ty),*) => {
        $(
            impl ToLiteral for $t {
                fn to_literal(self) -> FluxResult<Literal> {
                    Ok(Literal::Int(i64::from(self)))
                }
            }
        )*
    };
}

int_literal!(i8, i16, i32, i64, u8, u16, u32);

impl ToLiteral for u64 {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::UInt(self))
    }
}

impl ToLiteral for f64 {
    fn to_literal(self) -> FluxResult<Literal> {
        if self.is_finite() {
            Ok(Literal::Float(self))
        } else {
            Err(FluxError::unsupported(
                "float",
                format!("{} has no Flux literal form", self),
            ))
        }
    }
}

impl ToLiteral for f32 {
    fn to_literal(self) -> FluxResult<Literal> {
        f64::from(self).to_literal()
    }
}

impl ToLiteral for bool {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::Bool(self))
    }
}

impl ToLiteral for DateTime<Utc> {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::Time(self))
    }
}

impl ToLiteral for FluxDuration {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::Duration(self))
    }
}

impl ToLiteral for chrono::Duration {
    fn to_literal(self) -> FluxResult<Literal> {
        Ok(Literal::Duration(FluxDuration::from(self)))
    }
}

impl ToLiteral for &serde_json::Value {
    fn to_literal(self) -> FluxResult<Literal> {
        use serde_json::Value;

        match self {
            Value::String(s) => Ok(Literal::String(s.clone())),
            Value::Bool(b) => Ok(Literal::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Literal::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Literal::UInt(u))
                } else {
                    n.as_f64()
                        .ok_or_else(|| FluxError::unsupported("number", n.to_string()))?
                        .to_literal()
                }
            }
            Value::Null => Err(FluxError::unsupported(
                "null",
                "null has no Flux literal form",
            )),
            Value::Array(_) => Err(FluxError::unsupported(
                "array",
                "arrays cannot be compared against a column",
            )),
            Value::Object(_) => Err(FluxError::unsupported(
                "object",
                "objects cannot be compared against a column",
            )),
        }
    }
}

impl ToLiteral for serde_json::Value {
    fn to_literal(self) -> FluxResult<Literal> {
        (&self).to_literal()
    }
}
