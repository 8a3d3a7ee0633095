//! InfluxDB v2 HTTP connector
//!
//! Talks to the `/api/v2/query` and `/api/v2/write` endpoints with token
//! authentication. Errors are mapped but never retried.

use super::annotated;
use super::connector::{Connector, ConnectorError, Precision};
use crate::result::FluxTable;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::time::Duration;

/// Connection settings for [`HttpConnector`]
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the server (e.g., "http://localhost:8086")
    pub url: String,
    /// API token sent as `Authorization: Token <token>`
    pub token: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl HttpConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            request_timeout_ms: 30_000,
        }
    }
}

/// Connector over the InfluxDB v2 REST API
pub struct HttpConnector {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpConnector {
    /// Create a connector; fails only if the HTTP client cannot be built
    pub fn new(config: HttpConfig) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.config.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ConnectorError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(ConnectorError::Api {
                status: status.as_u16(),
                message: api_message(&text),
            })
        }
    }
}

fn map_send_error(e: reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout
    } else if e.is_connect() {
        ConnectorError::Unavailable
    } else {
        ConnectorError::Request(e)
    }
}

/// Error bodies are JSON `{"code": ..., "message": ...}`; fall back to raw text
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl Connector for HttpConnector {
    async fn query(&self, flux: &str, org: &str) -> Result<Vec<FluxTable>, ConnectorError> {
        let body = QueryRequest::new(flux);

        let response = self
            .client
            .post(self.endpoint("/api/v2/query"))
            .query(&[("org", org)])
            .header(AUTHORIZATION, self.auth_header())
            .header(ACCEPT, "application/csv")
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let response = Self::check(response).await?;
        let text = response.text().await.map_err(ConnectorError::Request)?;

        tracing::trace!(bytes = text.len(), "Received query response");
        annotated::decode(&text)
    }

    async fn write(
        &self,
        bucket: &str,
        org: &str,
        precision: Precision,
        body: String,
    ) -> Result<(), ConnectorError> {
        let response = self
            .client
            .post(self.endpoint("/api/v2/write"))
            .query(&[("org", org), ("bucket", bucket), ("precision", precision.as_str())])
            .header(AUTHORIZATION, self.auth_header())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(map_send_error)?;

        Self::check(response).await?;
        Ok(())
    }

    fn close(&self) {
        tracing::debug!(url = %self.config.url, "Closing HTTP connector");
    }
}

// ============================================
// Request DTOs
// ============================================

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: Dialect,
}

impl<'a> QueryRequest<'a> {
    fn new(query: &'a str) -> Self {
        Self {
            query,
            kind: "flux",
            dialect: Dialect::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Dialect {
    header: bool,
    delimiter: &'static str,
    annotations: [&'static str; 3],
    #[serde(rename = "commentPrefix")]
    comment_prefix: &'static str,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: ",",
            annotations: ["datatype", "group", "default"],
            comment_prefix: "#",
        }
    }
}
