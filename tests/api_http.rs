// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /sources
// - POST /runs (200 with run result, 400 on bad options)
// - GET /runs/{run_id} (stored metadata, 404 when unknown)

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use signal_digest::api::{self, AppState};
use signal_digest::{DigestConfig, FixedClock, InMemoryHistory, Pipeline};

const BODY_LIMIT: usize = 1024 * 1024;
const FIXTURE: &str = include_str!("fixtures/reference_signals.json");

/// Build the same Router the binary uses, with a fixed clock and no artifacts.
fn test_router() -> Router {
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap());
    let pipeline = Pipeline::new(Arc::new(InMemoryHistory::new()), Arc::new(clock));
    api::router(AppState::new(pipeline, DigestConfig::default()))
}

async fn read_json(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

fn post_runs(payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/runs")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /runs")
}

fn fixture_payload(request: Json) -> Json {
    let records: Json = serde_json::from_str(FIXTURE).expect("parse fixture");
    json!({ "request": request, "batch": { "records": records } })
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "ok");
}

#[tokio::test]
async fn api_sources_lists_every_source() {
    let app = test_router();
    let req = Request::builder()
        .uri("/sources")
        .body(Body::empty())
        .expect("build GET /sources");

    let resp = app.oneshot(req).await.expect("oneshot /sources");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    let arr = v.as_array().expect("array");
    assert_eq!(arr.len(), 6);
    assert!(arr.iter().all(|s| s["enabled"] == true));
    assert_eq!(arr[1]["source"], "hackernews");
}

#[tokio::test]
async fn api_runs_returns_ranked_digest() {
    let app = test_router();
    let payload = fixture_payload(json!({ "query": "rust ecosystem", "window_days": 7 }));

    let resp = app.oneshot(post_runs(&payload)).await.expect("oneshot /runs");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["run_id"].as_str().map(str::len), Some(16));
    assert_eq!(v["integrity"]["total"], 51);
    assert_eq!(v["stats"]["kept"], 9);
    assert_eq!(v["ranked"].as_array().map(Vec::len), Some(9));
    assert_eq!(v["ranked"][0]["rank"], 1);
    assert_eq!(v["persisted"], true);
    assert_eq!(v["source_counts"]["reddit"], 6);
}

#[tokio::test]
async fn api_runs_rejects_invalid_options_with_400() {
    for request in [
        json!({ "query": "   " }),
        json!({ "query": "rust", "window_days": 0 }),
        json!({ "query": "rust", "top_n": 5000 }),
        json!({ "query": "rust", "sources": ["reddit", "myspace"] }),
    ] {
        let app = test_router();
        let resp = app
            .oneshot(post_runs(&fixture_payload(request.clone())))
            .await
            .expect("oneshot /runs");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "request: {request}");
        let v = read_json(resp).await;
        assert!(
            v["error"].as_str().is_some_and(|e| !e.is_empty()),
            "missing error for {request}"
        );
    }
}

#[tokio::test]
async fn api_run_metadata_is_retrievable() {
    let app = test_router();
    let payload = fixture_payload(json!({ "query": "rust ecosystem" }));

    let resp = app
        .clone()
        .oneshot(post_runs(&payload))
        .await
        .expect("oneshot /runs");
    let run_id = read_json(resp).await["run_id"]
        .as_str()
        .expect("run_id")
        .to_string();

    let req = Request::builder()
        .uri(format!("/runs/{run_id}"))
        .body(Body::empty())
        .expect("build GET /runs/id");
    let resp = app.clone().oneshot(req).await.expect("oneshot /runs/id");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["run_id"], run_id.as_str());
    assert_eq!(v["integrity_total"], 51);

    let req = Request::builder()
        .uri("/runs/does-not-exist")
        .body(Body::empty())
        .expect("build GET /runs/missing");
    let resp = app.oneshot(req).await.expect("oneshot /runs/missing");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
