use axum::body::Body;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum_test::TestServer;
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use inkwell_site::domain::types::{SiteUser, StreamEvent};
use inkwell_site::router::build_router;
use inkwell_site::state::AppState;
use inkwell_site::usecase::session::{SESSION_COOKIE, issue_session_token};

use crate::helpers::{TEST_SESSION_SECRET, test_state};

async fn server() -> TestServer {
    TestServer::new(build_router(test_state().await)).unwrap()
}

// ── WebAuthn endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn login_start_for_unknown_user_is_not_found() {
    let server = server().await;

    let res = server
        .post("/api/webauthn/login-start")
        .json(&json!({ "username": "nobody" }))
        .await;

    res.assert_status(StatusCode::NOT_FOUND);
    let body: Value = res.json();
    assert_eq!(body["kind"], "ACCOUNT_NOT_FOUND");
}

#[tokio::test]
async fn login_start_without_username_is_bad_request() {
    let server = server().await;

    let res = server
        .post("/api/webauthn/login-start")
        .json(&json!({}))
        .await;

    res.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = res.json();
    assert_eq!(body["kind"], "INVALID_INPUT");
}

#[tokio::test]
async fn login_start_with_malformed_json_is_bad_request() {
    let server = server().await;

    let res = server
        .post("/api/webauthn/login-start")
        .text("{\"username\":")
        .content_type("application/json")
        .await;

    res.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_finish_with_unknown_login_id_is_unauthorized() {
    let server = server().await;

    let res = server
        .post("/api/webauthn/login-finish")
        .json(&json!({ "loginId": Uuid::new_v4(), "credential": {} }))
        .await;

    res.assert_status(StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn register_start_is_forbidden_when_closed() {
    let server = server().await;

    let res = server
        .post("/api/webauthn/register-start")
        .json(&json!({ "username": "mallory" }))
        .await;

    res.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn register_start_returns_creation_options_when_open() {
    let mut state = test_state().await;
    state.allow_registration = true;
    let server = TestServer::new(build_router(state)).unwrap();

    let res = server
        .post("/api/webauthn/register-start")
        .json(&json!({ "username": "carol" }))
        .await;

    res.assert_status_ok();
    let body: Value = res.json();
    assert!(body["registrationId"].is_string());
    assert!(body["expiresAt"].is_string());
    assert_eq!(body["publicKey"]["rp"]["id"], "localhost");
    assert_eq!(body["publicKey"]["user"]["name"], "carol");
}

// ── Session and status ───────────────────────────────────────────────────────

#[tokio::test]
async fn session_without_cookie_is_unauthorized() {
    let server = server().await;
    server
        .get("/api/session")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_with_valid_cookie_reports_the_user() {
    let server = server().await;
    let user = SiteUser {
        id: Uuid::new_v4(),
        username: "alice".to_owned(),
    };
    let (token, _) = issue_session_token(&user, TEST_SESSION_SECRET).unwrap();

    let res = server
        .get("/api/session")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}")).unwrap(),
        )
        .await;

    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["username"], "alice");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn status_and_health_respond() {
    let server = server().await;

    let res = server.get("/api/status").await;
    res.assert_status_ok();
    let body: Value = res.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);

    server.get("/healthz").await.assert_status_ok();
    server.get("/readyz").await.assert_status_ok();
}

// ── GET /api/stream ──────────────────────────────────────────────────────────

async fn open_stream(state: &AppState) -> axum::response::Response {
    build_router(state.clone())
        .oneshot(
            Request::get("/api/stream")
                .header(header::ACCEPT, "text/event-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn next_frame(stream: &mut axum::body::BodyDataStream) -> String {
    let chunk = stream.next().await.unwrap().unwrap();
    String::from_utf8(chunk.to_vec()).unwrap()
}

fn connection_of(frame: &str) -> String {
    let data = frame
        .lines()
        .find_map(|l| l.strip_prefix("data: "))
        .unwrap();
    let value: Value = serde_json::from_str(data).unwrap();
    value["connection"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn stream_responds_with_event_stream_headers() {
    let state = test_state().await;
    let res = open_stream(&state).await;

    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn stream_greets_each_connection_with_a_distinct_id() {
    let state = test_state().await;

    let mut first = open_stream(&state).await.into_body().into_data_stream();
    let mut second = open_stream(&state).await.into_body().into_data_stream();
    let a = next_frame(&mut first).await;
    let b = next_frame(&mut second).await;

    assert!(a.contains("event: connected"));
    assert!(a.contains("id: 1"));
    assert_ne!(connection_of(&a), connection_of(&b));
}

#[tokio::test]
async fn stream_delivers_published_events_in_order() {
    let state = test_state().await;
    let mut body = open_stream(&state).await.into_body().into_data_stream();
    next_frame(&mut body).await;

    state.hub.publish(StreamEvent::message("first"));
    state.hub.publish(StreamEvent::named("tick", "second"));

    let one = next_frame(&mut body).await;
    let two = next_frame(&mut body).await;
    assert!(one.contains("data: first") && one.contains("id: 2"));
    assert!(two.contains("event: tick") && two.contains("data: second"));
    assert!(two.contains("id: 3"));
}

#[tokio::test]
async fn dropping_stream_releases_connection() {
    let state = test_state().await;

    let bodies: Vec<_> = futures::future::join_all((0..10).map(|_| open_stream(&state))).await;
    assert_eq!(state.connections.len(), 10);
    assert_eq!(state.hub.subscriber_count(), 10);

    drop(bodies);
    assert_eq!(state.connections.len(), 0);
    assert_eq!(state.hub.subscriber_count(), 0);
}

#[tokio::test]
async fn shutdown_ends_open_streams() {
    let state = test_state().await;
    let mut body = open_stream(&state).await.into_body().into_data_stream();
    next_frame(&mut body).await;

    state.shutdown.cancel();
    assert!(body.next().await.is_none());
    assert!(state.connections.is_empty());
}

#[tokio::test]
async fn status_counts_resumed_streams() {
    let state = test_state().await;
    let resumed = build_router(state.clone())
        .oneshot(
            Request::get("/api/stream")
                .header("last-event-id", "17")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let fresh = open_stream(&state).await;

    let server = TestServer::new(build_router(state.clone())).unwrap();
    let body: Value = server.get("/api/status").await.json();
    assert_eq!(body["connections"], 2);
    assert_eq!(body["resumed_connections"], 1);
    assert!(body["oldest_connection_secs"].is_u64());

    drop((resumed, fresh));
    let body: Value = server.get("/api/status").await.json();
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn healthz_reports_draining_after_shutdown() {
    let state = test_state().await;
    let server = TestServer::new(build_router(state.clone())).unwrap();
    server.get("/healthz").await.assert_status_ok();

    state.shutdown.cancel();
    server
        .get("/healthz")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    server.get("/readyz").await.assert_status_ok();
}
