//! End-to-end tests for the `/infoblox/` webhook.
//!
//! Requests are driven through the full axum router; the Infoblox backend
//! is a wiremock server whose call counts are verified on drop.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ipam_relay::config::SIGNATURE_MAX_AGE_SECS;
use ipam_relay::web::signature::sign;
use ipam_relay::web::{DATE_HEADER, SIGNATURE_HEADER};
use ipam_relay::{router, AppState, Config};

const KEY: &str = "relay-test-key";

// =============================================================================
// Test Helpers
// =============================================================================

fn config(backend_endpoint: String) -> Config {
    Config {
        signing_key: KEY.to_string(),
        domain_field: "DOMAIN_NAME".to_string(),
        backend_endpoint,
        backend_user: "admin".to_string(),
        backend_pass: "secret".to_string(),
        backend_verify: true,
        backend_timeout_ms: 5_000,
        port: 0,
        signature_max_age: SIGNATURE_MAX_AGE_SECS,
    }
}

fn app_for(server: &MockServer) -> Router {
    app_with_endpoint(format!("{}/wapi/", server.uri()))
}

fn app_with_endpoint(endpoint: String) -> Router {
    router(AppState::new(config(endpoint)).unwrap())
}

fn signed_request(body: &str, date: &str) -> Request<Body> {
    let signature = sign(KEY.as_bytes(), body.as_bytes(), date).unwrap();
    Request::builder()
        .method("POST")
        .uri("/infoblox/")
        .header("content-type", "application/json")
        .header(DATE_HEADER, date)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn fresh_request(body: &Value) -> Request<Body> {
    signed_request(&body.to_string(), &Utc::now().to_rfc2822())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn send_json(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Backend that fails the test if it receives any call.
async fn silent_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    server
}

fn allocate_event() -> Value {
    json!({
        "eventName": "AllocateIpAddressRequest",
        "data": {"SCALR_SERVER_HOSTNAME": "web1", "SCALR_CLOUD_PLATFORM": "aws"},
        "userData": "10.0.0.0/24"
    })
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_unsigned_request_forbidden() {
    let server = silent_backend().await;

    let request = Request::builder()
        .method("POST")
        .uri("/infoblox/")
        .body(Body::from(allocate_event().to_string()))
        .unwrap();

    let (status, body) = send(app_for(&server), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_stale_request_forbidden() {
    let server = silent_backend().await;
    let date = (Utc::now() - Duration::seconds(SIGNATURE_MAX_AGE_SECS as i64 + 5)).to_rfc2822();

    let (status, body) = send(
        app_for(&server),
        signed_request(&allocate_event().to_string(), &date),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_tampered_body_forbidden() {
    let server = silent_backend().await;
    let date = Utc::now().to_rfc2822();
    let signature = sign(KEY.as_bytes(), allocate_event().to_string().as_bytes(), &date).unwrap();

    let mut tampered = allocate_event();
    tampered["userData"] = json!("10.9.0.0/24");

    let request = Request::builder()
        .method("POST")
        .uri("/infoblox/")
        .header(DATE_HEADER, date)
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(tampered.to_string()))
        .unwrap();

    let (status, _) = send(app_for(&server), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Malformed Requests
// =============================================================================

#[tokio::test]
async fn test_invalid_json_bad_request() {
    let server = silent_backend().await;

    let (status, body) = send(
        app_for(&server),
        signed_request("{\"eventName\": ", &Utc::now().to_rfc2822()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_missing_envelope_key_bad_request() {
    let server = silent_backend().await;

    let (status, body) = send(
        app_for(&server),
        fresh_request(&json!({"eventName": "AllocateIpAddressRequest", "data": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_missing_hostname_bad_request() {
    let server = silent_backend().await;

    let (status, _) = send(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "DeregisterIpAddressRequest",
            "data": {},
            "userData": ""
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Allocation
// =============================================================================

#[tokio::test]
async fn test_allocate_returns_backend_address() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/wapi/record:host"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "result": {"ipv4addrs": [{"ipv4addr": "10.0.0.10"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send_json(app_for(&server), fresh_request(&allocate_event())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "ip_address": "10.0.0.10"}));
}

#[tokio::test]
async fn test_allocate_backend_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let app = app_with_endpoint(format!("http://127.0.0.1:{}/wapi/", port));
    let (status, body) = send_json(app, fresh_request(&allocate_event())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["msg"]
        .as_str()
        .unwrap()
        .starts_with("Cannot connect to backend"));
}

#[tokio::test]
async fn test_allocate_backend_without_address() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": {}})))
        .mount(&server)
        .await;

    let (status, body) = send_json(app_for(&server), fresh_request(&allocate_event())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["msg"].as_str().unwrap().contains("Invalid response"));
}

#[tokio::test]
async fn test_allocate_static_skips_backend() {
    let server = silent_backend().await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "AllocateIpAddressRequest",
            "data": {"SCALR_SERVER_HOSTNAME": "web1", "INFOBLOX_STATIC": "192.168.10.4"},
            "userData": "10.0.0.0/24"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "ip_address": "192.168.10.4"}));
}

// =============================================================================
// Release & Registration
// =============================================================================

#[tokio::test]
async fn test_deregister_deletes_host() {
    let server = MockServer::start().await;
    let reference = "record:host/ZG5z:web1.example.com/default";

    Mock::given(method("GET"))
        .and(path("/wapi/record:host"))
        .and(query_param("name", "web1.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"_ref": reference}])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/wapi/{}", reference)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(reference)))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "DeregisterIpAddressRequest",
            "data": {"SCALR_SERVER_HOSTNAME": "Web1", "DOMAIN_NAME": "Example.com"},
            "userData": ""
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_deregister_static_skips_backend() {
    let server = silent_backend().await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "DeregisterIpAddressRequest",
            "data": {"SCALR_SERVER_HOSTNAME": "web1", "INFOBLOX_STATIC": "192.168.10.4"},
            "userData": ""
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_register_is_noop() {
    let server = silent_backend().await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "RegisterIpAddressRequest",
            "data": {"SCALR_SERVER_HOSTNAME": "web1", "SCALR_IP_ADDRESS": "10.0.0.10"},
            "userData": ""
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_register_with_non_string_data() {
    let server = silent_backend().await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "RegisterIpAddressRequest",
            "data": {"SCALR_SERVER_HOSTNAME": "web1", "SCALR_SERVER_INDEX": 1},
            "userData": null
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));
}

#[tokio::test]
async fn test_unhandled_event_acknowledged() {
    let server = silent_backend().await;

    let (status, body) = send_json(
        app_for(&server),
        fresh_request(&json!({
            "eventName": "HostInit",
            "data": {},
            "userData": ""
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": false}));
}

// =============================================================================
// Auxiliary Routes
// =============================================================================

#[tokio::test]
async fn test_sample_route_returns_host_record() {
    let server = silent_backend().await;

    for verb in ["GET", "POST"] {
        let request = Request::builder()
            .method(verb)
            .uri("/sample/record:host")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send_json(app_for(&server), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["ipv4addrs"][0]["ipv4addr"], "10.0.0.10");
    }
}

#[tokio::test]
async fn test_health() {
    let server = silent_backend().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send_json(app_for(&server), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
