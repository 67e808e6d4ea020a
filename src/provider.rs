//! HTTP transport to the monitoring provider.
//!
//! The client owns the provider base URLs and translates non-2xx replies
//! into [`ServiceError::Provider`] carrying the message resolved from
//! the provider error envelope. No retries happen here; failures
//! propagate to the caller immediately.

use crate::{
    config::AppConfig,
    error::{Result, ServiceError},
};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const GENERIC_PROVIDER_ERROR: &str = "cannot connect to the monitoring API";

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    monitoring_url: String,
    query_url: String,
    resource_manager_url: String,
}

/// Which provider base URL a resource GET is issued against.
#[derive(Debug, Clone, Copy)]
pub enum ApiBase {
    Monitoring,
    ResourceManager,
}

/// The batch body posted to the time-series query endpoint. `from`/`to`
/// are epoch-millisecond strings; the sentinel default-project lookup
/// posts without a range.
#[derive(Debug, Clone, Serialize)]
pub struct RequestBatch<Q: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub queries: Vec<Q>,
}

/// Per-batch reply: one result entry per refId. A `BTreeMap` keeps
/// downstream iteration deterministic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: BTreeMap<String, QueryResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub series: Option<Vec<Series>>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub tables: Option<Vec<Table>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub points: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Provider error envelope on non-2xx replies.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl ProviderClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ServiceError::Internal(err.into()))?;

        Ok(Self {
            client,
            monitoring_url: config.monitoring_url.clone(),
            query_url: config.query_url.clone(),
            resource_manager_url: config.resource_manager_url.clone(),
        })
    }

    /// Posts a query batch to the time-series endpoint.
    pub async fn post_batch<Q: Serialize>(&self, batch: &RequestBatch<Q>) -> Result<BatchResponse> {
        debug!(queries = batch.queries.len(), "dispatching query batch");
        let response = self
            .client
            .post(&self.query_url)
            .json(batch)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        response
            .json::<BatchResponse>()
            .await
            .map_err(|err| ServiceError::Internal(err.into()))
    }

    /// Fetches a provider resource list. The provider wraps list replies
    /// in an envelope keyed by the final path segment (`.../services` →
    /// `{"services": [...]}`); the unwrapped items are returned, empty
    /// when the key is absent.
    pub async fn get_list(&self, base: ApiBase, path: &str) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/{}", self.base_url(base), path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ServiceError::Internal(err.into()))?;

        let key = envelope_key(path);
        let items = body
            .get(key)
            .and_then(|items| items.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(items)
    }

    /// Connectivity probe: lists metric descriptors for the given
    /// project and discards the body.
    pub async fn test(&self, project: &str) -> Result<()> {
        let url = format!(
            "{}/{}/metricDescriptors",
            self.monitoring_url,
            urlencoding::encode(project)
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response).await?;
        Ok(())
    }

    fn base_url(&self, base: ApiBase) -> &str {
        match base {
            ApiBase::Monitoring => &self.monitoring_url,
            ApiBase::ResourceManager => &self.resource_manager_url,
        }
    }
}

/// Final path segment, query string stripped; the provider names its
/// list envelope after it.
fn envelope_key(path: &str) -> &str {
    let last = path.rsplit('/').next().unwrap_or(path);
    last.split('?').next().unwrap_or(last)
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::Provider {
        status: err.status().map(|s| s.as_u16()).unwrap_or(0),
        message: format!("{}: {}", GENERIC_PROVIDER_ERROR, err),
    }
}

/// Resolves non-2xx replies into a provider error. Message preference:
/// envelope `error.message` (with code), then the HTTP status text, then
/// a fixed generic message.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Option<ErrorEnvelope> = response.json().await.ok();
    let message = resolve_error_message(status, body);
    Err(ServiceError::Provider {
        status: status.as_u16(),
        message,
    })
}

fn resolve_error_message(status: StatusCode, body: Option<ErrorEnvelope>) -> String {
    if let Some(detail) = body.and_then(|envelope| envelope.error) {
        if let Some(message) = detail.message.filter(|m| !m.is_empty()) {
            return match detail.code {
                Some(code) => format!("{}. {}", code, message),
                None => message,
            };
        }
    }

    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => GENERIC_PROVIDER_ERROR.to_string(),
    }
}
