//! Measurements and line protocol
//!
//! A [`Measurement`] is one point to write: a name, a set of tags, at least one
//! field and an optional timestamp. It serializes to one line of the form
//!
//! ```text
//! measurement,tag1=v1,tag2=v2 field1=v1,field2=v2 timestamp
//! ```
//!
//! Tags and fields are kept sorted by key. A point without a timestamp is
//! stamped by the server when it receives the write.

use crate::client::Precision;
use crate::error::{FluxError, FluxResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a measurement field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
    String(String),
}

impl FieldValue {
    fn validate(&self, key: &str) -> FluxResult<()> {
        match self {
            Self::Float(v) if !v.is_finite() => Err(FluxError::unsupported(
                "float",
                format!("field `{}` is {}, which line protocol cannot carry", key, v),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}i", v),
            Self::UInt(v) => write!(f, "{}u", v),
            Self::Bool(true) => f.write_str("t"),
            Self::Bool(false) => f.write_str("f"),
            Self::String(s) => write!(f, "\"{}\"", escape(s, &['"', '\\'])),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

/// One data point to be written
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    name: String,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
    timestamp: Option<i64>,
}

impl Measurement {
    /// Create a measurement; at least one field is required
    pub fn new<K, V>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> FluxResult<Self>
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(FluxError::InvalidMeasurement(
                "measurement name must not be empty".to_string(),
            ));
        }

        let mut measurement = Self {
            name,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: None,
        };
        for (k, v) in fields {
            measurement = measurement.field(k, v)?;
        }

        if measurement.fields.is_empty() {
            return Err(FluxError::EmptyFields {
                measurement: measurement.name,
            });
        }
        Ok(measurement)
    }

    /// Set a field, replacing any existing field of the same name
    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> FluxResult<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(FluxError::InvalidMeasurement(
                "field key must not be empty".to_string(),
            ));
        }
        let value = value.into();
        value.validate(&key)?;
        self.fields.insert(key, value);
        Ok(self)
    }

    /// Set a tag, replacing any existing tag of the same name
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set several tags at once
    pub fn tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the timestamp, in the precision used for the write. Last call wins.
    pub fn time(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the timestamp from a point in time, expressed in the precision the
    /// point will be written with
    pub fn time_at(self, at: DateTime<Utc>, precision: Precision) -> FluxResult<Self> {
        let ts = precision
            .timestamp(&at)
            .ok_or(FluxError::InvalidTimestamp(at.timestamp()))?;
        Ok(self.time(ts))
    }

    /// Set the timestamp from a value in s, ms, us or ns, rescaled to the
    /// precision the point will be written with
    pub fn time_normalized(self, timestamp: i64, precision: Precision) -> FluxResult<Self> {
        let nanos = normalize_timestamp(timestamp)?;
        Ok(self.time(precision.from_nanos(nanos)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn tag_set(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Serialize as one line of line protocol, without trailing newline
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape(&self.name, &[',', ' ']))?;

        for (k, v) in &self.tags {
            write!(f, ",{}={}", escape_key(k), escape_key(v))?;
        }

        for (i, (k, v)) in self.fields.iter().enumerate() {
            let sep = if i == 0 { ' ' } else { ',' };
            write!(f, "{}{}={}", sep, escape_key(k), v)?;
        }

        if let Some(ts) = self.timestamp {
            write!(f, " {}", ts)?;
        }

        Ok(())
    }
}

/// Scale a timestamp in seconds, milliseconds, microseconds or nanoseconds to
/// nanoseconds, guessing the unit from its magnitude
pub fn normalize_timestamp(timestamp: i64) -> FluxResult<i64> {
    let multiplier: i64 = if timestamp > 1_000_000_000_000_000_000 {
        1
    } else if timestamp > 1_000_000_000_000_000 {
        1_000
    } else if timestamp > 1_000_000_000_000 {
        1_000_000
    } else if timestamp > 1_000_000_000 {
        1_000_000_000
    } else {
        return Err(FluxError::InvalidTimestamp(timestamp));
    };

    timestamp
        .checked_mul(multiplier)
        .ok_or(FluxError::InvalidTimestamp(timestamp))
}

/// Join measurements into one newline-separated write body
pub fn to_line_protocol(measurements: &[Measurement]) -> String {
    measurements
        .iter()
        .map(Measurement::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
