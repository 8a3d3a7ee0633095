//! # fluxkit
//!
//! A fluent builder for Flux queries and line-protocol writes against
//! InfluxDB v2 style databases.
//!
//! ## Features
//!
//! - **Typed predicates**: `row("host").eq("a")? & row("_value").gt(0.5)?`
//! - **Append-only pipelines**: stages render in exactly the order they were added
//! - **Result shaping**: annotated CSV decoded into typed records
//! - **Line protocol**: measurements with tags, fields and timestamps
//!
//! ## Modules
//!
//! - [`flux`]: literals, predicates, stages and the query builder
//! - [`client`]: connector seam, HTTP connector and the client
//! - [`result`]: decoded tables and record shaping
//! - [`measurement`]: points to write and their line-protocol form
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fluxkit::{row, Client, Measurement, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("http://localhost:8086", "my-token", "my-org")?;
//!
//!     // Write a point
//!     let point = Measurement::new("cpu", [("usage", 0.64)])?.tag("host", "server01");
//!     client.write("telemetry", &[point]).await?;
//!
//!     // Read it back, one record per timestamp
//!     let records = client
//!         .query("telemetry")?
//!         .range("-1h")?
//!         .filter(row("_measurement").eq("cpu")? & row("host").eq("server01")?)
//!         .pivot()
//!         .to_dict()
//!         .await?;
//!
//!     for record in &records {
//!         println!("{:?}", record.get("usage"));
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod flux;
pub mod measurement;
pub mod result;

pub use client::{BoundQuery, Client, Connector, ConnectorError, HttpConfig, HttpConnector, Precision};

pub use config::{Config, ConfigError, ConnectionConfig, LoggingConfig, WriteConfig};

pub use error::{FluxError, FluxResult};

pub use flux::{
    row, AggregateFn, CompareOp, FluxDuration, Literal, LogicalOp, Pipeline, Predicate, Query,
    RangeBound, Row, Stage, ToLiteral,
};

pub use measurement::{to_line_protocol, FieldValue, Measurement};

pub use result::{FluxColumn, FluxRecord, FluxTable, Record, Value};
