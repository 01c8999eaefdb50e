/// End-to-end tests for the portal's auth surface, driven through the
/// real router
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use tower::ServiceExt;
use wolbridge::{config::PortalConfig, context::PortalContext, server};

const CLIENT: [u8; 4] = [203, 0, 113, 9];

async fn portal_app(dir: &Path) -> Router {
    let config = PortalConfig {
        bind_host: "127.0.0.1".to_string(),
        port: 0,
        // .invalid never resolves, so the network bypass stays out of the
        // way of these tests
        trusted_domain: "home.example.invalid".to_string(),
        rp_name: "Wolbridge Remote Power".to_string(),
        target_mac: "AA:BB:CC:DD:EE:FF".to_string(),
        relay_host: "127.0.0.1".to_string(),
        relay_port: 59999,
        credentials_file: dir.join("creds.json"),
        session_timeout_secs: 300,
        challenge_ttl_secs: 300,
        dns_ttl_secs: 300,
    };
    let ctx = PortalContext::new(config).await.unwrap();
    server::portal_router(ctx).layer(MockConnectInfo(SocketAddr::from((CLIENT, 44044))))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn credential(id: &str) -> Value {
    json!({
        "id": id,
        "rawId": format!("raw-{}", id),
        "response": {"clientDataJSON": "e30", "attestationObject": "AAAA"},
        "type": "public-key",
    })
}

#[tokio::test]
async fn guarded_route_denies_without_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    let (status, body) = post_json(&app, "/wake", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    assert_eq!(body["redirect"], "/");
}

#[tokio::test]
async fn register_then_authenticate_grants_access() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    let (status, options) =
        post_json(&app, "/register/begin", json!({"username": "alice"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(options["challenge"].is_string());
    assert_eq!(options["rp"]["id"], "home.example.invalid");

    let (status, body) = post_json(
        &app,
        "/register/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, request_options) =
        post_json(&app, "/authenticate/begin", json!({"username": "alice"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request_options["allowCredentials"][0]["id"], "raw-cred-1");

    let (status, body) = post_json(
        &app,
        "/authenticate/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // The session now admits guarded requests from this origin
    let (status, info) = get(&app, "/user_info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["username"], "alice");
    assert_eq!(info["method"], "credential_proof");
    assert_eq!(info["session_timeout"], 300);
}

#[tokio::test]
async fn mismatched_credential_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    post_json(&app, "/register/begin", json!({"username": "alice"})).await;
    post_json(
        &app,
        "/register/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;

    post_json(&app, "/authenticate/begin", json!({"username": "alice"})).await;
    let (status, body) = post_json(
        &app,
        "/authenticate/complete",
        json!({"username": "alice", "credential": credential("cred-2")}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/");

    // The failed proof established nothing
    let (status, _) = get(&app, "/user_info").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn completing_without_a_challenge_is_denied() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    let (status, _) = post_json(
        &app,
        "/authenticate/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_identity_cannot_begin_authentication() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    let (status, _) =
        post_json(&app, "/authenticate/begin", json!({"username": "nobody"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logout_clears_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    post_json(&app, "/register/begin", json!({"username": "alice"})).await;
    post_json(
        &app,
        "/register/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;
    post_json(&app, "/authenticate/begin", json!({"username": "alice"})).await;
    post_json(
        &app,
        "/authenticate/complete",
        json!({"username": "alice", "credential": credential("cred-1")}),
    )
    .await;

    let (status, _) = get(&app, "/user_info").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(&app, "/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = get(&app, "/user_info").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quick_ip_check_reports_without_granting() {
    let dir = tempfile::tempdir().unwrap();
    let app = portal_app(dir.path()).await;

    let (status, body) = get(&app, "/quick_ip_check").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bypass"], false);
    assert_eq!(body["client_ip"], "203.0.113.9");

    let (status, _) = get(&app, "/user_info").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
