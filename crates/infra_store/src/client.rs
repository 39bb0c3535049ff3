//! Web API HTTP client
//!
//! Implements the core record ports over HTTP:
//!
//! - `fetch`: `GET <entitySet>?fetchXml=...`, one request per page until a
//!   page comes back shorter than the page size
//! - `get`: `GET <entitySet>(<guid>)?$select=...`
//! - `patch`: `PATCH <entitySet>(<guid>)` with a JSON body
//!
//! # Error Handling
//!
//! Responses are mapped to `PortError` variants:
//! - 404 -> `PortError::NotFound`
//! - 401/403 -> `PortError::Unauthorized`
//! - 429 -> `PortError::RateLimited` (with `Retry-After` seconds)
//! - other 4xx -> `PortError::Rejected`
//! - 5xx -> `PortError::ServiceUnavailable`
//! - timeouts -> `PortError::Timeout`, other transport failures ->
//!   `PortError::Connection`
//!
//! The client never retries on its own; retry policy belongs to the caller.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use core_kernel::{DomainPort, PortError, RecordFetchPort, RecordQuery, RecordWritePort, ResourceRef, Row};

use crate::auth::TokenProvider;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::fetchxml;

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    value: Vec<Row>,
}

/// HTTP client for the Web API
pub struct DataverseClient {
    http_client: reqwest::Client,
    config: StoreConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for DataverseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataverseClient")
            .field("api_base", &self.config.api_base())
            .finish()
    }
}

impl DataverseClient {
    /// Creates a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: StoreConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, StoreError> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
            tokens,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn collection_url(&self, entity: &str) -> String {
        format!("{}/{}", self.config.api_base(), fetchxml::entity_set_name(entity))
    }

    fn record_url(&self, resource: &ResourceRef) -> String {
        format!(
            "{}/{}({})",
            self.config.api_base(),
            fetchxml::entity_set_name(&resource.entity),
            resource.id
        )
    }

    async fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, PortError> {
        let token = self.tokens.access_token().await?;
        Ok(self
            .http_client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0"))
    }

    /// Sends the request and maps any failure status
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
        resource: &str,
    ) -> Result<reqwest::Response, PortError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, operation, self.config.request_timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        warn!(
            status = status.as_u16(),
            resource,
            operation,
            "Store request failed"
        );
        Err(PortError::from_status(status.as_u16(), resource, body, retry_after))
    }
}

impl DomainPort for DataverseClient {}

#[async_trait]
impl RecordFetchPort for DataverseClient {
    #[instrument(skip(self, query), fields(entity = %query.entity))]
    async fn fetch(&self, query: &RecordQuery, page_size: u32) -> Result<Vec<Row>, PortError> {
        if page_size == 0 {
            return Err(PortError::validation("page size must be positive"));
        }

        let url = self.collection_url(&query.entity);
        let mut rows = Vec::new();
        let mut page = 1u32;

        loop {
            let xml = fetchxml::render(query, page, page_size);
            let request = self
                .request(reqwest::Method::GET, &url)
                .await?
                .query(&[("fetchXml", xml.as_str())]);
            let response = self.send(request, "fetch", &query.entity).await?;
            let body: CollectionResponse = response
                .json()
                .await
                .map_err(|e| PortError::transformation(format!("invalid collection response: {}", e)))?;

            let received = body.value.len();
            rows.extend(body.value);
            debug!(page, received, total = rows.len(), "Fetched page");

            if received < page_size as usize {
                break;
            }
            page += 1;
        }

        Ok(rows)
    }
}

#[async_trait]
impl RecordWritePort for DataverseClient {
    #[instrument(skip(self, resource, select), fields(resource = %resource))]
    async fn get(&self, resource: &ResourceRef, select: &[&str]) -> Result<Row, PortError> {
        let url = self.record_url(resource);
        let mut request = self.request(reqwest::Method::GET, &url).await?;
        if !select.is_empty() {
            request = request.query(&[("$select", select.join(","))]);
        }
        let response = self.send(request, "get", &resource.to_string()).await?;
        response
            .json::<Row>()
            .await
            .map_err(|e| PortError::transformation(format!("invalid record response: {}", e)))
    }

    #[instrument(skip(self, resource, body), fields(resource = %resource))]
    async fn patch(&self, resource: &ResourceRef, body: Row) -> Result<(), PortError> {
        let url = self.record_url(resource);
        let request = self
            .request(reqwest::Method::PATCH, &url)
            .await?
            .json(&body);
        self.send(request, "patch", &resource.to_string()).await?;
        debug!("Record patched");
        Ok(())
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn transport_error(error: reqwest::Error, operation: &str, timeout: Duration) -> PortError {
    if error.is_timeout() {
        PortError::Timeout {
            operation: operation.to_string(),
            duration_ms: timeout.as_millis() as u64,
        }
    } else {
        PortError::Connection {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}
