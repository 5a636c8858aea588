//! End-to-end exercises of the Control Plane's axum router, driven without
//! binding a socket via `tower::ServiceExt::oneshot`. These cover the
//! cross-endpoint flows that the inline per-file tests in
//! `src/control/server.rs` and `src/control/state.rs` do not: a full
//! register -> match -> status -> run -> results sequence against one
//! shared router, and the reuse-mode status reset.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cloudpunch::config::{LoadBalancers, NetworkMode};
use cloudpunch::control::{build_router, ControlState, ServerState};
use tower::ServiceExt;

fn router(pairing_enabled: bool) -> axum::Router {
    let control = ControlState::new("42", NetworkMode::Full);
    build_router(ServerState {
        control,
        loadbalancers: LoadBalancers::default(),
        pairing_enabled,
    })
}

async fn post_json(router: &axum::Router, path: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get_json(router: &axum::Router, path: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, value)
}

#[tokio::test]
async fn full_run_sequence_registers_matches_gates_and_collects_results() {
    let router = router(true);

    let server = serde_json::json!({
        "hostname": "cloudpunch-42-s-r1-n1-s1",
        "internal_ip": "10.0.0.1",
        "external_ip": "203.0.113.1",
        "role": "server",
    });
    let client = serde_json::json!({
        "hostname": "cloudpunch-42-c-r1-n1-c1",
        "internal_ip": "10.0.1.1",
        "external_ip": "203.0.113.2",
        "role": "client",
    });
    let (status, _) = post_json(&router, "/api/register", server).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_json(&router, "/api/register", client).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = get_json(&router, "/api/register").await;
    assert_eq!(listing["count"], 2);

    let (status, _) = post_json(&router, "/api/config", serde_json::json!({"test": ["ping"]})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_json(&router, "/api/test/match").await;
    assert_eq!(status, StatusCode::OK);

    let go = serde_json::json!({"hostname": "cloudpunch-42-s-r1-n1-s1"});
    let (status, body) = post_json(&router, "/api/test/status", go.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "go");
    let (_, body) = post_json(&router, "/api/test/status", go).await;
    assert_eq!(body["status"], "hold");

    let run_req = serde_json::json!({"hostname": "cloudpunch-42-s-r1-n1-s1"});
    let (status, body) = post_json(&router, "/api/test/run", run_req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match_ip"], "203.0.113.2");

    let result = serde_json::json!({
        "hostname": "cloudpunch-42-s-r1-n1-s1",
        "results": {"ping": {"loss": 0}},
    });
    let (status, _) = post_json(&router, "/api/test/results", result).await;
    assert_eq!(status, StatusCode::OK);

    let (_, results) = get_json(&router, "/api/test/results").await;
    assert_eq!(results.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_404s_when_pairing_enabled_and_no_peer_registered() {
    let router = router(true);
    let solo = serde_json::json!({
        "hostname": "cloudpunch-42-s-r1-n1-s1",
        "internal_ip": "10.0.0.1",
        "external_ip": null,
        "role": "server",
    });
    post_json(&router, "/api/register", solo).await;
    get_json(&router, "/api/test/match").await;

    let run_req = serde_json::json!({"hostname": "cloudpunch-42-s-r1-n1-s1"});
    let (status, _) = post_json(&router, "/api/test/run", run_req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reuse_mode_reset_clears_status_but_keeps_registrations() {
    let router = router(false);
    let server = serde_json::json!({
        "hostname": "cloudpunch-42-s-r1-n1-s1",
        "internal_ip": "10.0.0.1",
        "external_ip": null,
        "role": "server",
    });
    post_json(&router, "/api/register", server).await;
    get_json(&router, "/api/test/match").await;

    let go = serde_json::json!({"hostname": "cloudpunch-42-s-r1-n1-s1"});
    post_json(&router, "/api/test/status", go.clone()).await;

    let response = router
        .clone()
        .oneshot(Request::delete("/api/test/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = post_json(&router, "/api/test/status", go).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "go");

    let (_, listing) = get_json(&router, "/api/register").await;
    assert_eq!(listing["count"], 1);
}
