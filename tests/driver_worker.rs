//! Exercises `ControlClient` against a real HTTP server (`wiremock`) rather
//! than the in-process axum router, to cover the retry/backoff and timeout
//! behavior that `tower::ServiceExt::oneshot` tests can't: a flaky control
//! plane that fails a request or two before succeeding, and one that never
//! answers at all.

use cloudpunch::driver::ControlClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn wait_for_health_succeeds_once_the_control_plane_comes_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "OK"})))
        .mount(&server)
        .await;

    let client = ControlClient::new(server.uri(), 3, false).unwrap();
    assert!(client.wait_for_health().await.is_ok());
}

#[tokio::test]
async fn wait_for_health_fails_after_exhausting_retries_against_a_dead_control_plane() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ControlClient::new(server.uri(), 2, false).unwrap();
    assert!(client.wait_for_health().await.is_err());
}

#[tokio::test]
async fn registered_count_retries_past_a_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/register"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 3,
            "instances": [],
        })))
        .mount(&server)
        .await;

    let client = ControlClient::new(server.uri(), 3, false).unwrap();
    let count = client.registered_count().await.unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn publish_config_and_seal_match_round_trip_against_the_mock_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "saved"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/test/match"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "matched"})))
        .mount(&server)
        .await;

    let client = ControlClient::new(server.uri(), 3, false).unwrap();
    client
        .publish_config(&serde_json::json!({"test": ["ping"]}))
        .await
        .unwrap();
    assert!(client.seal_match().await.is_ok());
}

#[tokio::test]
async fn results_reflects_whatever_the_control_plane_currently_holds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/test/results"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"hostname": "cloudpunch-1-s-r1-n1-s1", "results": {"ping": {"loss": 0}}},
        ])))
        .mount(&server)
        .await;

    let client = ControlClient::new(server.uri(), 3, false).unwrap();
    let results = client.results().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].hostname, "cloudpunch-1-s-r1-n1-s1");
}
