// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt as _; // for `oneshot`

use news_gatekeeper::api::{self, AppState};
use news_gatekeeper::GatekeeperConfig;

const BODY_LIMIT: usize = 1024 * 1024;

/// Default config: no artifacts, no judge.
fn test_router() -> Router {
    api::router(AppState::from_config(&GatekeeperConfig::default()))
}

async fn post_json(app: Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

#[tokio::test]
async fn health_returns_ok() {
    let resp = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap().trim(), "OK");
}

#[tokio::test]
async fn rank_merges_duplicates_and_reports_breakdown() {
    let payload = json!({
        "documents": [
            {"id": "a", "title": "Tesla Optimus Delayed Again", "url": "https://electrek.co/a"},
            {"id": "b", "title": "Tesla's Optimus Robot Delayed, Again", "url": "https://blog.example/b"},
            {"id": "c", "title": "Acme announces partnership", "url": "https://www.prnewswire.com/c"}
        ]
    });
    let (status, v) = post_json(test_router(), "/rank", payload).await;
    assert_eq!(status, StatusCode::OK);

    let docs = v["documents"].as_array().expect("documents array");
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["id"], "a");
    assert_eq!(docs[0]["merged_children"][0]["id"], "b");
    assert_eq!(docs[1]["id"], "c");

    let bd = &docs[1]["score_breakdown"];
    assert!((bd["reputation"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    assert!(bd.get("final").is_some());
    assert_eq!(bd["judge_reason"], "judge disabled");
    assert!(docs[0].get("embedding").is_none());

    assert_eq!(v["summary"]["input"], 3);
    assert_eq!(v["summary"]["merged"], 1);
}

#[tokio::test]
async fn rank_accepts_bare_array_and_derives_ids() {
    let payload = json!([
        {"title": "Ford cuts Lightning output", "url": "https://www.reuters.com/x"}
    ]);
    let (status, v) = post_json(test_router(), "/rank", payload).await;
    assert_eq!(status, StatusCode::OK);
    let id = v["documents"][0]["id"].as_str().unwrap();
    assert!(id.starts_with("doc-"));
}

#[tokio::test]
async fn rank_rejects_malformed_body() {
    let (status, _) = post_json(test_router(), "/rank", json!({"documents": [{"url": "x"}]})).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn status_reports_judge_settings() {
    let resp = test_router()
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["judge_enabled"], false);
    assert_eq!(v["batch_size"], 10);
    assert_eq!(v["pacing_ms"], 4000);
    assert_eq!(v["max_attempts"], 3);
}

#[tokio::test]
async fn metrics_endpoint_exposes_gatekeeper_series() {
    let app = news_gatekeeper::app(&GatekeeperConfig::default()).expect("app builds");
    let (status, _) = post_json(
        app.clone(),
        "/rank",
        json!([{"id": "m", "title": "Charging network expands", "url": "https://insideevs.com/m"}]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("gatekeeper_documents_scored_total"));
}
