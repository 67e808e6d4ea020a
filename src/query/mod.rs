//! Query translation engine.
//!
//! Panel targets pass through normalization (legacy-shape migration and
//! the runnable gate), variable interpolation, and project resolution
//! before being coalesced into one provider batch. The provider reply is
//! then reshaped into flat series frames.

pub mod interpolate;
pub mod lookup;
pub mod normalize;
pub mod reshape;

mod annotation;
mod project;

use crate::{
    config::AppConfig,
    error::Result,
    models::{MetricsQuery, QueryRequest, QueryType, SloQuery, Target, VIEW_FULL},
    provider::{BatchResponse, ProviderClient, RequestBatch},
    template::{self, Format},
};
use reshape::PanelResponse;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

pub const TIME_SERIES_QUERY: &str = "timeSeriesQuery";
pub const ANNOTATION_QUERY: &str = "annotationQuery";
pub const DEFAULT_PROJECT_LOOKUP: &str = "getGCEDefaultProject";

pub const REDUCE_NONE: &str = "REDUCE_NONE";
pub const ALIGN_NONE: &str = "ALIGN_NONE";

#[derive(Debug)]
pub struct QueryEngine {
    config: Arc<AppConfig>,
    provider: ProviderClient,
    gce_default_project: OnceCell<String>,
}

/// Wire payload for one time-series query. Both variant payloads are
/// always present; the provider-side interpreter picks the active one
/// from `queryType`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPayload {
    pub ref_id: String,
    pub query_type: QueryType,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<i64>,
    pub metric_query: MetricsQuery,
    pub slo_query: SloQuery,
}

/// Wire payload for the annotation query, a flat single-query shape
/// with aggregation disabled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPayload {
    pub ref_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub view: String,
    pub cross_series_reducer: String,
    pub per_series_aligner: String,
    pub title: String,
    pub text: String,
    pub tags: String,
    pub project_name: String,
    pub filters: Vec<String>,
    pub metric_type: String,
}

/// Sentinel payload for GCE default-project discovery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultProjectLookupPayload {
    pub ref_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub status: &'static str,
    pub message: String,
}

impl QueryEngine {
    pub fn new(config: Arc<AppConfig>, provider: ProviderClient) -> Self {
        Self {
            config,
            provider,
            gce_default_project: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub(crate) fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    /// Panel entry point: dispatches the batch and reshapes the reply
    /// into series frames.
    pub async fn query(&self, request: &QueryRequest) -> Result<PanelResponse> {
        let data = self.get_time_series(request).await?;
        let normalized: Vec<Target> = request
            .targets
            .iter()
            .cloned()
            .map(normalize::normalize)
            .collect();
        Ok(reshape::reshape(&normalized, data))
    }

    /// Normalizes and filters the batch, interpolates each survivor, and
    /// posts a single provider request. A batch with no runnable queries
    /// returns an empty result map without touching the network.
    pub async fn get_time_series(&self, request: &QueryRequest) -> Result<BatchResponse> {
        self.ensure_default_project().await?;

        let queries: Vec<TimeSeriesPayload> = request
            .targets
            .iter()
            .cloned()
            .map(normalize::normalize)
            .filter(normalize::should_run)
            .map(|target| self.build_time_series_payload(target, request))
            .collect();

        if queries.is_empty() {
            debug!("no runnable queries in batch, skipping dispatch");
            return Ok(BatchResponse::default());
        }

        debug!(queries = queries.len(), "translated query batch");
        self.provider
            .post_batch(&RequestBatch {
                from: Some(request.range.from.to_string()),
                to: Some(request.range.to.to_string()),
                queries,
            })
            .await
    }

    /// Connectivity check for the datasource configuration page. Always
    /// reports through the status field, never as a failed call.
    pub async fn test_datasource(&self) -> TestResult {
        match self.connectivity_probe().await {
            Ok(()) => TestResult {
                status: "success",
                message: "Successfully queried the monitoring API.".to_string(),
            },
            Err(err) => TestResult {
                status: "error",
                message: err.to_string(),
            },
        }
    }

    async fn connectivity_probe(&self) -> Result<()> {
        self.ensure_default_project().await?;
        self.provider.test(&self.default_project()).await
    }

    fn build_time_series_payload(
        &self,
        target: Target,
        request: &QueryRequest,
    ) -> TimeSeriesPayload {
        let scope = &request.scoped_vars;

        let metric_query = target.metric_query.unwrap_or_default();
        let configured_project = metric_query.project_name.clone();
        let mut metric_query = interpolate::interpolate_metric_query(metric_query, scope);

        let project = if configured_project.is_empty() {
            self.default_project()
        } else {
            configured_project
        };
        metric_query.project_name = template::replace(&project, scope, Format::Plain);
        if metric_query.view.is_empty() {
            metric_query.view = VIEW_FULL.to_string();
        }

        let slo_query = target
            .slo_query
            .map(|slo| interpolate::interpolate_slo_query(slo, scope))
            .unwrap_or_default();

        TimeSeriesPayload {
            ref_id: target.ref_id,
            query_type: target.query_type.unwrap_or(QueryType::Metrics),
            kind: TIME_SERIES_QUERY,
            interval_ms: target.interval_ms.or(request.interval_ms),
            metric_query,
            slo_query,
        }
    }
}
