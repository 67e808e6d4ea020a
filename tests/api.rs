mod support;

use gcmq::config::AuthType;
use http::StatusCode;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{get, post_json, router, router_with_api_key, API_KEY};

fn query_request(targets: Vec<serde_json::Value>) -> serde_json::Value {
    json!({
        "range": { "from": 1_700_000_000_000i64, "to": 1_700_003_600_000i64 },
        "intervalMs": 60_000,
        "targets": targets,
    })
}

fn metrics_target(ref_id: &str, unit: &str) -> serde_json::Value {
    json!({
        "refId": ref_id,
        "queryType": "metrics",
        "metricQuery": {
            "projectName": "test-project",
            "metricType": "compute.googleapis.com/instance/cpu/utilization",
            "unit": unit,
        }
    })
}

#[tokio::test]
async fn query_reshapes_results_and_attaches_shared_unit() {
    let provider = MockServer::start_async().await;
    let batch = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/query")
                .body_contains("timeSeriesQuery");
            then.status(200).json_body(json!({
                "results": {
                    "A": {
                        "refId": "A",
                        "series": [
                            { "name": "cpu us-east1-b", "points": [[0.42, 1_700_000_000_000i64]] },
                            { "name": "cpu us-west1-a", "points": [[0.17, 1_700_000_000_000i64]] },
                        ],
                        "meta": { "alignmentPeriod": "+60s" },
                    },
                    "B": { "refId": "B", "meta": {} },
                }
            }));
        })
        .await;

    let request = query_request(vec![
        metrics_target("A", "By"),
        metrics_target("B", "By"),
    ]);
    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/query",
        request,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let frames = body["data"].as_array().expect("data should be an array");
    assert_eq!(frames.len(), 2, "entry without series must emit no frames");
    assert_eq!(frames[0]["target"], "cpu us-east1-b");
    assert_eq!(frames[1]["target"], "cpu us-west1-a");
    for frame in frames {
        assert_eq!(frame["refId"], "A");
        assert_eq!(frame["meta"]["alignmentPeriod"], "+60s");
        assert_eq!(frame["unit"], "bytes");
    }
    batch.assert_hits_async(1).await;
}

#[tokio::test]
async fn differing_units_emit_unitless_frames() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST).path("/query");
            then.status(200).json_body(json!({
                "results": {
                    "A": {
                        "refId": "A",
                        "series": [{ "name": "cpu", "points": [] }],
                    }
                }
            }));
        })
        .await;

    let request = query_request(vec![
        metrics_target("A", "By"),
        metrics_target("B", "s"),
    ]);
    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/query",
        request,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["data"][0].get("unit").is_none());
}

#[tokio::test]
async fn batch_with_no_runnable_queries_skips_the_provider() {
    let provider = MockServer::start_async().await;
    let batch = provider
        .mock_async(|when, then| {
            when.method(POST).path("/query");
            then.status(200).json_body(json!({ "results": {} }));
        })
        .await;

    let hidden = json!({
        "refId": "A",
        "hide": true,
        "queryType": "metrics",
        "metricQuery": { "metricType": "compute.googleapis.com/instance/cpu/utilization" }
    });
    let incomplete = json!({
        "refId": "B",
        "queryType": "metrics",
        "metricQuery": { "metricType": "" }
    });

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/query",
        query_request(vec![hidden, incomplete]),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": [] }));
    batch.assert_hits_async(0).await;
}

#[tokio::test]
async fn legacy_flat_targets_are_migrated_before_dispatch() {
    let provider = MockServer::start_async().await;
    let batch = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/query")
                .body_contains("compute.googleapis.com/instance/cpu/utilization")
                .body_contains("\"view\":\"FULL\"");
            then.status(200).json_body(json!({
                "results": {
                    "A": {
                        "refId": "A",
                        "series": [{ "name": "cpu", "points": [] }],
                    }
                }
            }));
        })
        .await;

    let legacy = json!({
        "refId": "A",
        "metricType": "compute.googleapis.com/instance/cpu/utilization",
        "filters": ["zone", "=", "us-east1-b"],
    });
    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/query",
        query_request(vec![legacy]),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["target"], "cpu");
    batch.assert_hits_async(1).await;
}

#[tokio::test]
async fn gce_discovery_runs_once_across_requests() {
    let provider = MockServer::start_async().await;
    let discovery = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/query")
                .body_contains("getGCEDefaultProject");
            then.status(200).json_body(json!({
                "results": {
                    "getGCEDefaultProject": {
                        "meta": { "defaultProject": "gce-project" }
                    }
                }
            }));
        })
        .await;
    let batch = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/query")
                .body_contains("timeSeriesQuery")
                .body_contains("gce-project");
            then.status(200).json_body(json!({ "results": {} }));
        })
        .await;

    let target = json!({
        "refId": "A",
        "queryType": "metrics",
        "metricQuery": { "metricType": "compute.googleapis.com/instance/cpu/utilization" }
    });

    let app = router(&provider, AuthType::Gce);
    for _ in 0..2 {
        let (status, _) = post_json(
            app.clone(),
            "/api/query",
            query_request(vec![target.clone()]),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    discovery.assert_hits_async(1).await;
    batch.assert_hits_async(2).await;
}

#[tokio::test]
async fn provider_errors_surface_with_envelope_message() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST).path("/query");
            then.status(403).json_body(json!({
                "error": { "code": 403, "message": "permission denied" }
            }));
        })
        .await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/query",
        query_request(vec![metrics_target("A", "")]),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "403. permission denied");
}

#[tokio::test]
async fn missing_api_key_returns_401() {
    let provider = MockServer::start_async().await;
    let app = router_with_api_key(&provider);

    let (status, body) = post_json(
        app.clone(),
        "/api/query",
        query_request(vec![]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication failed");

    let (status, _) = post_json(app, "/api/query", query_request(vec![]), Some(API_KEY)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_endpoint_reports_success() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(GET).path("/v3/projects/test-project/metricDescriptors");
            then.status(200).json_body(json!({ "metricDescriptors": [] }));
        })
        .await;

    let (status, body) = get(router(&provider, AuthType::Jwt), "/api/test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
}

#[tokio::test]
async fn test_endpoint_never_fails_on_provider_errors() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(GET).path("/v3/projects/test-project/metricDescriptors");
            then.status(403).json_body(json!({
                "error": { "code": 403, "message": "permission denied" }
            }));
        })
        .await;

    let (status, body) = get(router(&provider, AuthType::Jwt), "/api/test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "403. permission denied");
}

#[tokio::test]
async fn metric_find_lists_projects() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(GET).path("/v1/projects");
            then.status(200).json_body(json!({
                "projects": [
                    { "projectId": "proj-1", "name": "Project One" },
                    { "projectId": "proj-2", "name": "Project Two" },
                ]
            }));
        })
        .await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/metric-find",
        json!({ "selectedQueryType": "projects" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "text": "Project One", "value": "proj-1" },
            { "text": "Project Two", "value": "proj-2" },
        ])
    );
}

#[tokio::test]
async fn metric_find_lists_service_level_objectives() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v3/projects/test-project/services/my-service/serviceLevelObjectives");
            then.status(200).json_body(json!({
                "serviceLevelObjectives": [
                    { "name": "projects/p/services/s/serviceLevelObjectives/slo-availability" }
                ]
            }));
        })
        .await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/metric-find",
        json!({ "selectedQueryType": "slo", "serviceId": "my-service" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "text": "slo-availability", "value": "slo-availability" }])
    );
}

#[tokio::test]
async fn metric_find_label_keys_come_from_result_metadata() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST).path("/query").body_contains("HEADERS");
            then.status(200).json_body(json!({
                "results": {
                    "metricFindQuery": {
                        "refId": "metricFindQuery",
                        "meta": {
                            "labels": { "resource.label.zone": ["us-east1-b", "us-west1-a"] }
                        }
                    }
                }
            }));
        })
        .await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/metric-find",
        json!({
            "selectedQueryType": "labelKeys",
            "metricType": "compute.googleapis.com/instance/cpu/utilization"
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "text": "resource.label.zone", "value": "resource.label.zone" }])
    );
}

#[tokio::test]
async fn metric_find_serves_static_aggregations() {
    let provider = MockServer::start_async().await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/metric-find",
        json!({ "selectedQueryType": "aggregations" }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let options = body.as_array().expect("options should be an array");
    assert!(options.contains(&json!({ "text": "mean", "value": "REDUCE_MEAN" })));
}

#[tokio::test]
async fn annotations_map_table_rows_to_events() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/query")
                .body_contains("annotationQuery")
                .body_contains("REDUCE_NONE");
            then.status(200).json_body(json!({
                "results": {
                    "annotationQuery": {
                        "refId": "annotationQuery",
                        "tables": [{
                            "rows": [
                                ["2026-01-15T10:30:00Z", "deploy finished", "series", "version 4.2"],
                                ["2026-01-15T11:00:00Z", "rollback", "series", "version 4.1"],
                            ]
                        }]
                    }
                }
            }));
        })
        .await;

    let (status, body) = post_json(
        router(&provider, AuthType::Jwt),
        "/api/annotations",
        json!({
            "range": { "from": 1_700_000_000_000i64, "to": 1_700_003_600_000i64 },
            "annotation": {
                "metricType": "compute.googleapis.com/instance/cpu/utilization",
                "title": "deploys",
                "text": "rollout",
            }
        }),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            { "time": 1_768_473_000_000i64, "title": "deploy finished", "text": "version 4.2", "tags": [] },
            { "time": 1_768_474_800_000i64, "title": "rollback", "text": "version 4.1", "tags": [] },
        ])
    );
}

#[tokio::test]
async fn healthz_responds_without_api_key() {
    let provider = MockServer::start_async().await;
    let (status, body) = get(router_with_api_key(&provider), "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}
