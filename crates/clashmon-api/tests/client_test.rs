#![allow(clippy::unwrap_used)]
// Integration tests for `ClashClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clashmon_api::probe::probe_url;
use clashmon_api::{
    ApiRequest, ClashClient, Endpoint, Error, Method, ProbeResult, RetryPolicy, STREAMING_SERVICES, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        jitter_ratio: 0.0,
    }
}

async fn setup() -> (MockServer, ClashClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = ClashClient::new(
        base_url,
        SecretString::from("secret"),
        TransportConfig::default().with_timeout(Duration::from_secs(2)),
    )
    .with_retry_policy(fast_retry());
    (server, client)
}

// ── Connection check ────────────────────────────────────────────────

#[tokio::test]
async fn test_check_connection_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/version"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"version": "v1.18.1", "meta": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let info = client.check_connection().await.unwrap();
    assert_eq!(info.variant(), "Meta Core");
    assert_eq!(info.version_or_unknown(), "v1.18.1");
}

#[tokio::test]
async fn test_check_connection_rejects_non_clash_endpoint() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hello": "world"})))
        .mount(&server)
        .await;

    let result = client.check_connection().await;
    assert!(
        matches!(result, Err(Error::UnexpectedPayload(_))),
        "expected UnexpectedPayload, got: {result:?}"
    );
    assert!(!client.connected().await);
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized"})))
        .mount(&server)
        .await;

    let result = client.check_connection().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Response handling ───────────────────────────────────────────────

#[tokio::test]
async fn test_streaming_endpoint_reads_requested_line() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"inuse\":0,\"oslimit\":0}\n\n{\"inuse\":52428800,\"oslimit\":0}\n{\"inuse\":1,\"oslimit\":0}\n"),
        )
        .mount(&server)
        .await;

    let value = client.send(&Endpoint::Memory.request()).await.unwrap();
    assert_eq!(value, json!({"inuse": 52_428_800, "oslimit": 0}));
}

#[tokio::test]
async fn test_short_stream_yields_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/memory"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"inuse\":0,\"oslimit\":0}\n"))
        .mount(&server)
        .await;

    let value = client.send(&Endpoint::Memory.request()).await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_no_content_yields_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/connections"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let value = client.send(&ApiRequest::delete("connections")).await.unwrap();
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/proxies"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.send_with_retry(&ApiRequest::get("proxies")).await;
    assert!(
        matches!(result, Err(Error::Status { status: 500, .. })),
        "expected Status 500, got: {result:?}"
    );
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let server = MockServer::start().await;
    let client = ClashClient::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("secret"),
        TransportConfig::default().with_timeout(Duration::from_millis(100)),
    )
    .with_retry_policy(fast_retry());

    Mock::given(method("GET"))
        .and(path("/proxies"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"proxies": {}}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let result = client.send_with_retry(&ApiRequest::get("proxies")).await;
    assert!(
        matches!(result, Err(Error::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn test_suppressed_failure_is_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rules"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let value = client.send_suppressed(&ApiRequest::get("rules")).await;
    assert_eq!(value, json!({}));
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/configs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let result = client.send(&ApiRequest::get("configs")).await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>nope</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Request construction ────────────────────────────────────────────

#[tokio::test]
async fn test_path_segments_are_encoded() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/proxies/Auto%20Select"))
        .and(body_json(json!({"name": "HK-01"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let req = ApiRequest::from_segments(Method::PUT, ["proxies", "Auto Select"])
        .json(json!({"name": "HK-01"}));
    client.send(&req).await.unwrap();
}

#[tokio::test]
async fn test_query_parameters_are_sent() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/dns/query"))
        .and(query_param("name", "example.com"))
        .and(query_param("type", "AAAA"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Status": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let req = ApiRequest::get("dns/query")
        .query("name", "example.com")
        .query("type", "AAAA");
    assert_eq!(client.send(&req).await.unwrap(), json!({"Status": 0}));
}

// ── Session lifecycle ───────────────────────────────────────────────

#[tokio::test]
async fn test_close_is_idempotent_and_session_reopens() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.0"})))
        .expect(2)
        .mount(&server)
        .await;

    assert!(!client.is_open());
    assert!(client.connected().await);
    assert!(client.is_open());

    client.close();
    client.close();
    assert!(!client.is_open());

    assert!(client.connected().await);
    assert!(client.is_open());
}

// ── Aggregation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_snapshot_tolerates_failed_endpoint() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/memory"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"inuse\":0}\n{\"inuse\":2048}\n"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/traffic"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"up\":100,\"down\":200}\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/connections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadTotal": 1,
            "downloadTotal": 2,
            "connections": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/proxies"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let snapshot = client.fetch_snapshot(false).await;

    assert_eq!(snapshot.memory, json!({"inuse": 2048}));
    assert_eq!(snapshot.traffic, json!({"up": 100, "down": 200}));
    assert_eq!(snapshot.connections["downloadTotal"], json!(2));
    assert!(snapshot.proxies.is_null());
    assert!(snapshot.streaming.is_empty());
    assert_eq!(
        snapshot.populated(),
        vec![Endpoint::Memory, Endpoint::Traffic, Endpoint::Connections]
    );
}

#[tokio::test]
async fn test_fetch_snapshot_with_streaming_probes_every_service() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let snapshot = client.fetch_snapshot(true).await;

    let keys: Vec<&str> = snapshot.streaming.keys().map(String::as_str).collect();
    let expected: Vec<&str> = STREAMING_SERVICES.iter().map(|s| s.key).collect();
    assert_eq!(keys, expected);
    assert!(snapshot.populated().is_empty());
}

// ── Streaming probes ────────────────────────────────────────────────

#[tokio::test]
async fn test_probe_counts_error_status_as_reachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/title/81280792"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let http = TransportConfig::default().build_client().unwrap();
    let result = probe_url(&http, &format!("{}/title/81280792", server.uri())).await;

    assert_eq!(result.status_code, 403);
    assert!(result.latency >= 0.0);
    assert!(result.is_reachable());
}

#[tokio::test]
async fn test_probe_timeout_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let http = TransportConfig::default()
        .with_timeout(Duration::from_millis(100))
        .build_client()
        .unwrap();
    let result = probe_url(&http, &server.uri()).await;

    assert_eq!(result, ProbeResult::unreachable());
}
