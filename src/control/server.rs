/// The Control Plane's HTTP surface: a single axum `Router` exposing the
/// endpoint table over `ControlState`.
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::LoadBalancers;
use crate::run::{Registration, TestResult};

use super::state::ControlState;

#[derive(Clone)]
pub struct ServerState {
    pub control: ControlState,
    pub loadbalancers: LoadBalancers,
    pub pairing_enabled: bool,
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/api/system/health", get(health))
        .route("/api/register", get(list_registered).post(register))
        .route("/api/config", get(get_config).post(set_config))
        .route("/api/test/match", get(seal_match))
        .route(
            "/api/test/status",
            post(ask_status).delete(reset_status),
        )
        .route("/api/test/run", post(test_run))
        .route("/api/test/results", get(list_results).post(submit_result))
        .layer(middleware::map_response(force_text_json_content_type))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The wire protocol fixes every response's `Content-Type` at
/// `text/json`, matching the original control plane's literal header on
/// every route rather than axum's default `application/json`.
async fn force_text_json_content_type(mut response: axum::response::Response) -> axum::response::Response {
    response
        .headers_mut()
        .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/json"));
    response
}

/// The uniform envelope error responses take, mirroring the JSON error
/// bodies a status-coded failure returns across the endpoint table.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(serde_json::json!({ "error": self.1 }));
        (self.0, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn list_registered(State(state): State<ServerState>) -> impl IntoResponse {
    let instances = state.control.list_instances().await;
    Json(serde_json::json!({
        "count": instances.len(),
        "instances": instances,
    }))
}

async fn register(
    State(state): State<ServerState>,
    Json(registration): Json<Registration>,
) -> impl IntoResponse {
    state.control.register(registration).await;
    Json(serde_json::json!({ "status": "registered" }))
}

async fn get_config(State(state): State<ServerState>) -> impl IntoResponse {
    match state.control.get_config().await {
        Some(config) => Json(config),
        None => Json(serde_json::json!({})),
    }
}

async fn set_config(
    State(state): State<ServerState>,
    Json(config): Json<serde_json::Value>,
) -> impl IntoResponse {
    state.control.set_config(config).await;
    Json(serde_json::json!({ "status": "saved" }))
}

async fn seal_match(State(state): State<ServerState>) -> impl IntoResponse {
    state.control.seal_match().await;
    Json(serde_json::json!({ "status": "matched" }))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    hostname: String,
}

async fn ask_status(
    State(state): State<ServerState>,
    Json(req): Json<StatusRequest>,
) -> impl IntoResponse {
    let status = if state.control.try_go(&req.hostname).await {
        "go"
    } else {
        "hold"
    };
    Json(serde_json::json!({ "status": status }))
}

async fn reset_status(State(state): State<ServerState>) -> impl IntoResponse {
    state.control.reset_status().await;
    Json(serde_json::json!({ "status": "deleted" }))
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    hostname: String,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    #[serde(flatten)]
    config: serde_json::Value,
    match_ip: Option<String>,
}

async fn test_run(
    State(state): State<ServerState>,
    Json(req): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.control.get_config().await.unwrap_or(serde_json::json!({}));
    match state
        .control
        .match_ip(&req.hostname, &state.loadbalancers, state.pairing_enabled)
        .await
    {
        Ok(match_ip) => Ok(Json(RunResponse { config, match_ip })),
        Err(()) => Err(ApiError(
            StatusCode::NOT_FOUND,
            format!("no peer available for {}", req.hostname),
        )),
    }
}

async fn list_results(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.control.list_results().await)
}

async fn submit_result(
    State(state): State<ServerState>,
    Json(result): Json<TestResult>,
) -> impl IntoResponse {
    state.control.submit_result(result).await;
    Json(serde_json::json!({ "status": "saved" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkMode;
    use crate::run::WorkerRole;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let control = ControlState::new("1", NetworkMode::Full);
        build_router(ServerState {
            control,
            loadbalancers: LoadBalancers::default(),
            pairing_enabled: false,
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/api/system/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_list_round_trips() {
        let router = app();
        let body = serde_json::json!({
            "hostname": "cloudpunch-1-s-r1-n1-s1",
            "internal_ip": "10.0.0.1",
            "external_ip": null,
            "role": "server",
        });
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/register")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/api/register").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_gate_matches_s4_invariant() {
        let control = ControlState::new("1", NetworkMode::Full);
        control
            .register(Registration {
                hostname: "cloudpunch-1-s-r1-n1-s1".into(),
                internal_ip: "10.0.0.1".into(),
                external_ip: None,
                role: WorkerRole::Server,
            })
            .await;
        control.seal_match().await;
        let router = build_router(ServerState {
            control,
            loadbalancers: LoadBalancers::default(),
            pairing_enabled: false,
        });

        let body = serde_json::json!({ "hostname": "cloudpunch-1-s-r1-n1-s1" });
        let first = router
            .clone()
            .oneshot(
                Request::post("/api/test/status")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router
            .oneshot(
                Request::post("/api/test/status")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
    }
}
