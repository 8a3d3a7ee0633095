//! Connector seam
//!
//! The client only needs three things from the database: run Flux text, accept
//! a batch of line-protocol points, and let go of its resources.

use crate::result::FluxTable;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Transport to a Flux-speaking database
#[async_trait]
pub trait Connector: Send + Sync {
    /// Run a Flux query on behalf of `org`
    async fn query(&self, flux: &str, org: &str) -> Result<Vec<FluxTable>, ConnectorError>;

    /// Write newline-separated line-protocol points into `bucket`
    async fn write(
        &self,
        bucket: &str,
        org: &str,
        precision: Precision,
        body: String,
    ) -> Result<(), ConnectorError>;

    /// Release connection resources. Called exactly once by the owning client.
    fn close(&self) {}
}

/// Timestamp precision of written points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    S,
    Ms,
    Us,
    #[default]
    Ns,
}

impl Precision {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "s" => Some(Self::S),
            "ms" => Some(Self::Ms),
            "us" | "µs" => Some(Self::Us),
            "ns" => Some(Self::Ns),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "s",
            Self::Ms => "ms",
            Self::Us => "us",
            Self::Ns => "ns",
        }
    }

    /// Nanoseconds in one unit of this precision
    pub fn nanos_per_unit(&self) -> i64 {
        match self {
            Self::S => 1_000_000_000,
            Self::Ms => 1_000_000,
            Self::Us => 1_000,
            Self::Ns => 1,
        }
    }

    /// Express a nanosecond timestamp in this precision, truncating
    pub fn from_nanos(&self, nanos: i64) -> i64 {
        nanos.div_euclid(self.nanos_per_unit())
    }

    /// Timestamp of `at` in this precision, `None` when it does not fit an `i64`
    pub fn timestamp(&self, at: &DateTime<Utc>) -> Option<i64> {
        match self {
            Self::S => Some(at.timestamp()),
            Self::Ms => Some(at.timestamp_millis()),
            Self::Us => Some(at.timestamp_micros()),
            Self::Ns => at.timestamp_nanos_opt(),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Database unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The engine accepted the request but reported a failure in the result stream
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<csv::Error> for ConnectorError {
    fn from(err: csv::Error) -> Self {
        ConnectorError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision() {
        assert_eq!(Precision::default(), Precision::Ns);
        assert_eq!(Precision::from_str("MS"), Some(Precision::Ms));
        assert_eq!(Precision::from_str("minutes"), None);
        assert_eq!(Precision::Us.to_string(), "us");
    }

    #[test]
    fn test_precision_scaling() {
        let ns = 1_625_659_548_123_456_789;
        assert_eq!(Precision::Ns.from_nanos(ns), ns);
        assert_eq!(Precision::Us.from_nanos(ns), 1_625_659_548_123_456);
        assert_eq!(Precision::Ms.from_nanos(ns), 1_625_659_548_123);
        assert_eq!(Precision::S.from_nanos(ns), 1_625_659_548);
        assert_eq!(Precision::S.from_nanos(-1), -1);

        let at = DateTime::from_timestamp(1_625_659_548, 250_000_000).unwrap();
        assert_eq!(Precision::S.timestamp(&at), Some(1_625_659_548));
        assert_eq!(Precision::Ms.timestamp(&at), Some(1_625_659_548_250));
        assert_eq!(Precision::Ns.timestamp(&at), Some(1_625_659_548_250_000_000));
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::Api {
            status: 400,
            message: "bad request".to_string(),
        };
        assert_eq!(err.to_string(), "API error 400: bad request");
        assert_eq!(ConnectorError::Timeout.to_string(), "Request timeout");
    }
}
