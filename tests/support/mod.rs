//! Test harness: a GCMQ router wired against a mock provider.

use axum::{
    body::{self, Body},
    http::{header::CONTENT_TYPE, Request, Response, StatusCode},
    Router,
};
use gcmq::{
    config::{AppConfig, AuthType},
    server::Server,
};
use httpmock::MockServer;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";

pub fn test_config(provider: &MockServer, auth_type: AuthType) -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        monitoring_url: format!("{}/v3/projects", provider.base_url()),
        query_url: format!("{}/query", provider.base_url()),
        resource_manager_url: format!("{}/v1", provider.base_url()),
        auth_type,
        default_project: Some("test-project".to_string()),
        api_key: None,
        request_timeout: Duration::from_secs(5),
    }
}

pub fn router(provider: &MockServer, auth_type: AuthType) -> Router {
    Server::new(test_config(provider, auth_type))
        .expect("failed to build server")
        .router()
}

pub fn router_with_api_key(provider: &MockServer) -> Router {
    let mut config = test_config(provider, AuthType::Jwt);
    config.api_key = Some(API_KEY.to_string());
    Server::new(config).expect("failed to build server").router()
}

pub async fn post_json(
    router: Router,
    path: &str,
    body: Value,
    api_key: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        request = request.header("x-api-key", key);
    }

    let response = router
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .expect("request should not fail at the transport level");
    read_json(response).await
}

pub async fn get(router: Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap();

    let response = router
        .oneshot(request)
        .await
        .expect("request should not fail at the transport level");
    read_json(response).await
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body should be JSON")
    };
    (status, body)
}
