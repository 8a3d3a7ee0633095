//! Database client
//!
//! The [`Client`] owns a [`Connector`] for its whole lifetime and releases it
//! exactly once, either through [`Client::close`] or when the client is dropped
//! (early `?` returns and panics included).
//!
//! ## Data Flow
//!
//! 1. `client.query(bucket)` starts a [`BoundQuery`] with `from()`
//! 2. Chained [`Pipeline`] calls append stages
//! 3. A terminal call renders the Flux text and sends it through the connector
//! 4. The decoded tables are shaped into records
//!
//! ```rust,no_run
//! use fluxkit::client::Client;
//! use fluxkit::flux::{row, Pipeline};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new("http://localhost:8086", "my-token", "my-org")?;
//!
//! let records = client
//!     .query("telemetry")?
//!     .range("-1h")?
//!     .filter(row("_measurement").eq("cpu")?)
//!     .pivot()
//!     .to_dict()
//!     .await?;
//!
//! println!("{} rows", records.len());
//! client.close();
//! # Ok(())
//! # }
//! ```

mod annotated;
mod connector;
mod http;

pub use annotated::decode as decode_annotated_csv;
pub use connector::{Connector, ConnectorError, Precision};
pub use http::{HttpConfig, HttpConnector};

use crate::config::Config;
use crate::error::{FluxError, FluxResult};
use crate::flux::{Pipeline, Query, Stage};
use crate::measurement::{to_line_protocol, Measurement};
use crate::result::{shape_records, shape_tables, FluxTable, Record};
use std::fmt;

/// Client bound to one organization
pub struct Client<C: Connector = HttpConnector> {
    connector: C,
    org: String,
    precision: Precision,
    released: bool,
}

impl Client<HttpConnector> {
    /// Connect to an InfluxDB v2 server over HTTP
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
    ) -> FluxResult<Self> {
        Self::with_http(HttpConfig::new(url, token), org)
    }

    /// Connect using the `[connection]` and `[write]` sections of a config
    pub fn from_config(config: &Config) -> FluxResult<Self> {
        let client = Self::with_http(config.connection.http(), config.connection.org.clone())?;
        Ok(client.with_precision(config.write.precision))
    }

    /// Connect with explicit HTTP settings
    pub fn with_http(config: HttpConfig, org: impl Into<String>) -> FluxResult<Self> {
        let connector = HttpConnector::new(config).map_err(|e| FluxError::Client(e.to_string()))?;
        Ok(Self::with_connector(connector, org))
    }
}

impl<C: Connector> Client<C> {
    /// Wrap any connector
    pub fn with_connector(connector: C, org: impl Into<String>) -> Self {
        Self {
            connector,
            org: org.into(),
            precision: Precision::default(),
            released: false,
        }
    }

    /// Precision that written timestamps are expressed in
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Start a query reading from `bucket`
    pub fn query(&self, bucket: impl Into<String>) -> FluxResult<BoundQuery<'_, C>> {
        Ok(BoundQuery {
            client: self,
            query: Query::from_bucket(bucket)?,
        })
    }

    /// Render and run a standalone query
    pub async fn execute(&self, query: &Query) -> FluxResult<Vec<FluxTable>> {
        self.execute_flux(&query.render()).await
    }

    /// Run raw Flux text
    pub async fn execute_flux(&self, flux: &str) -> FluxResult<Vec<FluxTable>> {
        tracing::debug!(org = %self.org, flux = %flux, "Dispatching query");

        let tables = self
            .connector
            .query(flux, &self.org)
            .await
            .map_err(|source| FluxError::QueryExecution { source })?;

        tracing::debug!(tables = tables.len(), "Query returned");
        Ok(tables)
    }

    /// Write a batch of measurements into `bucket` in a single request
    pub async fn write(&self, bucket: &str, measurements: &[Measurement]) -> FluxResult<()> {
        if bucket.trim().is_empty() {
            return Err(FluxError::InvalidArgument(
                "bucket name must not be empty".to_string(),
            ));
        }
        if measurements.is_empty() {
            tracing::debug!(bucket = %bucket, "Nothing to write");
            return Ok(());
        }

        let body = to_line_protocol(measurements);
        tracing::info!(
            bucket = %bucket,
            points = measurements.len(),
            precision = %self.precision,
            "Writing points"
        );

        self.connector
            .write(bucket, &self.org, self.precision, body)
            .await
            .map_err(|source| FluxError::WriteExecution { source })
    }

    /// Release the connector now instead of at drop
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.connector.close();
        }
    }
}

impl<C: Connector> Drop for Client<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: Connector> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("org", &self.org)
            .field("precision", &self.precision)
            .field("released", &self.released)
            .finish()
    }
}

/// A query being prepared against a specific client
pub struct BoundQuery<'a, C: Connector> {
    client: &'a Client<C>,
    query: Query,
}

impl<'a, C: Connector> BoundQuery<'a, C> {
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Detach from the client
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Run the query and return the decoded tables
    pub async fn all(self) -> FluxResult<Vec<FluxTable>> {
        self.client.execute(&self.query).await
    }

    /// Run the query and return one record per result row
    pub async fn to_dict(self) -> FluxResult<Vec<Record>> {
        Ok(shape_records(self.all().await?))
    }

    /// Run the query and return the records grouped per table
    pub async fn to_tables(self) -> FluxResult<Vec<Vec<Record>>> {
        Ok(shape_tables(self.all().await?))
    }
}

impl<'a, C: Connector> Pipeline for BoundQuery<'a, C> {
    fn stages(&self) -> &[Stage] {
        self.query.stages()
    }

    fn push_stage(&mut self, stage: Stage) {
        self.query.push_stage(stage);
    }
}

impl<'a, C: Connector> fmt::Display for BoundQuery<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.query, f)
    }
}
