use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use gembot_core::session::SessionLimits;
use gembot_manager::manager::{EMPTY_REPLY_FALLBACK, ERROR_REPLY_FALLBACK};
use gembot_manager::{router, spawn_session_sweeper, AppState, Manager, SessionCookies};
use gembot_providers::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

/// Answers "<message> (turn N)" and fails or goes quiet on request.
struct ScriptedProvider;

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, history: &[Message], message: &str) -> ProviderResult<LLMResponse> {
        match message {
            "upstream down" => Err(ProviderError::ApiError("HTTP 503: unavailable".to_string())),
            "say nothing" => Ok(LLMResponse::default()),
            _ => Ok(LLMResponse::text(format!(
                "{} (turn {})",
                message,
                history.len() / 2 + 1
            ))),
        }
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }
}

fn app() -> Router {
    let manager = Manager::new(Arc::new(ScriptedProvider), SessionLimits::default(), 10_000);
    let cookies = SessionCookies::new("session", Some("route-test-secret")).expect("cookie signer");
    router(AppState::new(Arc::new(manager), cookies))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn with_cookie(mut request: Request<Body>, cookie: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().expect("cookie header"));
    request
}

fn with_session_header(mut request: Request<Body>, id: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("X-Session-ID", id.parse().expect("session header"));
    request
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(ToString::to_string);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload = serde_json::from_slice(&body).expect("json");
    (status, cookie, payload)
}

#[tokio::test]
async fn chat_returns_reply_and_sets_session_cookie() {
    let app = app();
    let (status, cookie, payload) =
        send(&app, post_json("/chat", json!({"message": "  hello  "}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["response"], json!("hello (turn 1)"));
    assert_eq!(payload["message"], json!("hello"));
    assert!(cookie.expect("set-cookie").starts_with("session="));
}

#[tokio::test]
async fn chat_accepts_message_at_length_limit() {
    let app = app();
    let message = "a".repeat(10_000);
    let (status, _, payload) = send(&app, post_json("/chat", json!({ "message": message }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], json!(true));
}

#[tokio::test]
async fn chat_rejects_invalid_messages() {
    let app = app();
    let cases = [
        (json!({"message": ""}), "Empty message"),
        (json!({"message": "   "}), "Empty message"),
        (json!({}), "No message provided"),
        (json!({"message": 42}), "No message provided"),
        (
            json!({"message": "a".repeat(10_001)}),
            "Message too long. Please keep it under 10,000 characters.",
        ),
    ];

    for (body, error) in cases {
        let (status, _, payload) = send(&app, post_json("/chat", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["error"], json!(error));
    }
}

#[tokio::test]
async fn chat_rejects_non_json_body() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .expect("request");

    let (status, _, payload) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["success"], json!(false));
}

#[tokio::test]
async fn two_chats_in_one_session_build_ordered_history() {
    let app = app();
    let (_, cookie, _) = send(&app, post_json("/chat", json!({"message": "first"}))).await;
    let cookie = cookie.expect("set-cookie");

    let (status, again, payload) = send(
        &app,
        with_cookie(post_json("/chat", json!({"message": "second"})), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["response"], json!("second (turn 2)"));
    assert!(again.is_none(), "known session must not be reissued");

    let (status, _, payload) = send(&app, with_cookie(get("/api/history"), &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        payload["history"],
        json!([
            {"role": "user", "message": "first"},
            {"role": "assistant", "message": "first (turn 1)"},
            {"role": "user", "message": "second"},
            {"role": "assistant", "message": "second (turn 2)"},
        ])
    );
}

#[tokio::test]
async fn clear_then_history_is_empty() {
    let app = app();
    let (_, cookie, _) = send(&app, post_json("/chat", json!({"message": "remember me"}))).await;
    let cookie = cookie.expect("set-cookie");

    let (status, _, payload) = send(
        &app,
        with_cookie(post_json("/clear", json!({})), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["message"], json!("Conversation history cleared."));

    let (_, _, payload) = send(&app, with_cookie(get("/api/history"), &cookie)).await;
    assert_eq!(payload["history"], json!([]));

    // The next exchange starts a new conversation.
    let (_, _, payload) = send(
        &app,
        with_cookie(post_json("/chat", json!({"message": "again"})), &cookie),
    )
    .await;
    assert_eq!(payload["response"], json!("again (turn 1)"));
}

#[tokio::test]
async fn forged_cookie_gets_a_fresh_session() {
    let app = app();
    let (_, cookie, _) = send(&app, post_json("/chat", json!({"message": "secret"}))).await;
    let cookie = cookie.expect("set-cookie");
    let forged = format!("{}x", cookie);

    let (_, reissued, payload) = send(&app, with_cookie(get("/api/history"), &forged)).await;
    assert_eq!(payload["history"], json!([]));
    assert!(reissued.is_some());
}

#[tokio::test]
async fn upstream_failure_is_a_fallback_reply() {
    let app = app();
    let (status, cookie, payload) =
        send(&app, post_json("/chat", json!({"message": "upstream down"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["response"], json!(ERROR_REPLY_FALLBACK));

    let cookie = cookie.expect("set-cookie");
    let (_, _, payload) = send(
        &app,
        with_cookie(post_json("/chat", json!({"message": "say nothing"})), &cookie),
    )
    .await;
    assert_eq!(payload["response"], json!(EMPTY_REPLY_FALLBACK));

    let (_, _, payload) = send(&app, with_cookie(get("/api/history"), &cookie)).await;
    assert_eq!(payload["history"], json!([]));
}

#[tokio::test]
async fn health_is_always_healthy() {
    let app = app();
    let (status, _, payload) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], json!("healthy"));
    let timestamp = payload["timestamp"].as_str().expect("timestamp string");
    assert!(timestamp.parse::<i64>().is_ok());
}

#[tokio::test]
async fn api_chat_generates_session_id_when_missing() {
    let app = app();
    let (status, cookie, payload) =
        send(&app, post_json("/api/chat", json!({"message": "hello"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["response"], json!("hello (turn 1)"));
    let session_id = payload["session_id"].as_str().expect("session_id");
    assert!(uuid::Uuid::parse_str(session_id).is_ok());
    assert!(payload["timestamp"].as_str().is_some());
    assert!(cookie.is_none());
}

#[tokio::test]
async fn api_chat_continues_session_from_header() {
    let app = app();
    for expected in ["hi (turn 1)", "hi (turn 2)"] {
        let mut request = post_json("/api/chat", json!({"message": "hi"}));
        request
            .headers_mut()
            .insert("X-Session-ID", "client-42".parse().expect("header"));

        let (status, _, payload) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["session_id"], json!("client-42"));
        assert_eq!(payload["response"], json!(expected));
    }

    let mut request = get("/api/history");
    request
        .headers_mut()
        .insert("X-Session-ID", "client-42".parse().expect("header"));
    let (_, _, payload) = send(&app, request).await;
    assert_eq!(payload["session_id"], json!("client-42"));
    assert_eq!(payload["history"].as_array().map(Vec::len), Some(4));
}

#[tokio::test]
async fn api_chat_validates_like_chat() {
    let app = app();
    let (status, _, payload) = send(&app, post_json("/api/chat", json!({"message": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload, json!({"success": false, "error": "Empty message"}));
}

#[tokio::test]
async fn header_session_can_be_cleared() {
    let app = app();
    let (status, _, _) = send(
        &app,
        with_session_header(post_json("/api/chat", json!({"message": "hello"})), "h1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, cookie, payload) = send(
        &app,
        with_session_header(post_json("/clear", json!({})), "h1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["message"], json!("Conversation history cleared."));
    assert!(cookie.is_none(), "header clients get no cookie");

    let (_, _, payload) = send(&app, with_session_header(get("/api/history"), "h1")).await;
    assert_eq!(payload["session_id"], json!("h1"));
    assert_eq!(payload["history"], json!([]));
}

#[tokio::test]
async fn session_header_wins_over_cookie() {
    let app = app();
    let (_, cookie, _) = send(&app, post_json("/chat", json!({"message": "from cookie"}))).await;
    let cookie = cookie.expect("set-cookie");
    send(
        &app,
        with_session_header(post_json("/api/chat", json!({"message": "from header"})), "b"),
    )
    .await;

    let request = with_session_header(with_cookie(get("/api/history"), &cookie), "b");
    let (_, _, payload) = send(&app, request).await;
    assert_eq!(payload["session_id"], json!("b"));
    assert_eq!(payload["history"][0]["message"], json!("from header"));

    // Clearing with both present clears the header's session only.
    let request = with_session_header(with_cookie(post_json("/clear", json!({})), &cookie), "b");
    send(&app, request).await;

    let (_, _, payload) = send(&app, with_cookie(get("/api/history"), &cookie)).await;
    assert_eq!(payload["history"][0]["message"], json!("from cookie"));
    let (_, _, payload) = send(&app, with_session_header(get("/api/history"), "b")).await;
    assert_eq!(payload["history"], json!([]));
}

#[tokio::test]
async fn sweeper_purges_idle_sessions() {
    let limits = SessionLimits {
        ttl: Some(Duration::from_millis(50)),
        max_sessions: None,
    };
    let manager = Arc::new(Manager::new(Arc::new(ScriptedProvider), limits, 10_000));
    manager.chat("idle", Some("hello")).await.expect("exchange");
    assert_eq!(manager.session_count(), 1);

    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = spawn_session_sweeper(
        manager.clone(),
        Duration::from_millis(20),
        shutdown_tx.subscribe(),
    )
    .expect("sweeper runs when a ttl is set");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(manager.session_count(), 0);

    shutdown_tx.send(()).expect("sweeper is listening");
    sweeper.await.expect("sweeper stops cleanly");
}

#[tokio::test]
async fn sweeper_is_not_started_without_ttl() {
    let manager = Arc::new(Manager::new(
        Arc::new(ScriptedProvider),
        SessionLimits::default(),
        10_000,
    ));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    assert!(spawn_session_sweeper(manager, Duration::from_millis(20), shutdown_tx.subscribe())
        .is_none());
}
