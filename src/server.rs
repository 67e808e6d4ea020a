use crate::{
    config::AppConfig,
    error::{Result, ServiceError},
    models::{AnnotationEvent, AnnotationRequest, MetricFindRequest, QueryRequest, SelectableValue},
    provider::ProviderClient,
    query::{reshape::PanelResponse, QueryEngine, TestResult},
    state::AppState,
};
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

impl Server {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let provider = ProviderClient::new(&config)?;
        let engine = Arc::new(QueryEngine::new(Arc::clone(&config), provider));
        let state = AppState::new(Arc::clone(&config), engine);

        Ok(Self { config, state })
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(Self::health))
            .route("/api/query", post(Self::query))
            .route("/api/annotations", post(Self::annotations))
            .route("/api/metric-find", post(Self::metric_find))
            .route("/api/test", get(Self::test))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "GCMQ listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<serde_json::Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn query(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(request): Json<QueryRequest>,
    ) -> Result<Json<PanelResponse>> {
        enforce_api_key(&headers, &state.config)?;
        let response = state.engine.query(&request).await?;
        Ok(Json(response))
    }

    async fn annotations(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(request): Json<AnnotationRequest>,
    ) -> Result<Json<Vec<AnnotationEvent>>> {
        enforce_api_key(&headers, &state.config)?;
        let events = state.engine.annotation_query(&request).await?;
        Ok(Json(events))
    }

    async fn metric_find(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(request): Json<MetricFindRequest>,
    ) -> Result<Json<Vec<SelectableValue>>> {
        enforce_api_key(&headers, &state.config)?;
        let options = state.engine.metric_find(&request).await?;
        Ok(Json(options))
    }

    /// Connectivity probe for the configuration page. Failures are
    /// reported inside the body, never as an error response.
    async fn test(
        State(state): State<AppState>,
        headers: HeaderMap,
    ) -> Result<Json<TestResult>> {
        enforce_api_key(&headers, &state.config)?;
        Ok(Json(state.engine.test_datasource().await))
    }
}

fn enforce_api_key(headers: &HeaderMap, config: &AppConfig) -> Result<()> {
    if let Some(expected) = &config.api_key {
        let provided = headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected.as_str()) {
            return Err(ServiceError::Auth);
        }
    }

    Ok(())
}
