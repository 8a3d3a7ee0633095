//! Error types
//!
//! Construction errors are raised where the misuse happens (building a literal,
//! appending a stage, creating a measurement). Execution errors wrap whatever
//! the connector returned and keep it as the error source.

use crate::client::ConnectorError;
use thiserror::Error;

/// Errors produced by fluxkit
#[derive(Error, Debug)]
pub enum FluxError {
    /// A value could not be turned into a Flux literal
    #[error("Unsupported literal type `{type_name}`: {reason}")]
    UnsupportedLiteralType {
        type_name: &'static str,
        reason: String,
    },

    /// A measurement was built without any field
    #[error("Measurement `{measurement}` must have at least one field")]
    EmptyFields { measurement: String },

    /// A measurement name or field key is unusable
    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// A pipeline stage was given malformed parameters
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// A call was given an unusable argument, such as an empty bucket name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A timestamp could not be interpreted
    #[error("Invalid timestamp {0}: expected at least second precision")]
    InvalidTimestamp(i64),

    /// The connector failed while running a query
    #[error("Query execution failed: {source}")]
    QueryExecution {
        #[source]
        source: ConnectorError,
    },

    /// The connector failed while writing points
    #[error("Write execution failed: {source}")]
    WriteExecution {
        #[source]
        source: ConnectorError,
    },

    /// The client could not be constructed
    #[error("Client error: {0}")]
    Client(String),
}

impl FluxError {
    pub(crate) fn unsupported(type_name: &'static str, reason: impl Into<String>) -> Self {
        FluxError::UnsupportedLiteralType {
            type_name,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_stage(msg: impl Into<String>) -> Self {
        FluxError::InvalidStage(msg.into())
    }
}

/// Result type alias for fluxkit operations
pub type FluxResult<T> = Result<T, FluxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = FluxError::EmptyFields {
            measurement: "cpu".to_string(),
        };
        assert_eq!(err.to_string(), "Measurement `cpu` must have at least one field");

        let err = FluxError::unsupported("null", "null has no Flux literal form");
        assert_eq!(
            err.to_string(),
            "Unsupported literal type `null`: null has no Flux literal form"
        );

        let err = FluxError::InvalidArgument("bucket name must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid argument: bucket name must not be empty");
    }

    #[test]
    fn test_execution_error_keeps_source() {
        let err = FluxError::QueryExecution {
            source: ConnectorError::Api {
                status: 401,
                message: "unauthorized access".to_string(),
            },
        };

        let source = err.source().expect("source is preserved");
        assert_eq!(source.to_string(), "API error 401: unauthorized access");
        assert!(matches!(
            err,
            FluxError::QueryExecution {
                source: ConnectorError::Api { status: 401, .. }
            }
        ));
    }
}
