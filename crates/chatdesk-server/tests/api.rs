//! Router tests driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chatdesk_agent::{PromptBuilder, SupportAgent, FALLBACK_REPLY};
use chatdesk_client::LanguageModel;
use chatdesk_config::{AppConfig, LlmProvider};
use chatdesk_conversation::InMemoryConversationStore;
use chatdesk_core::{ChatdeskError, LlmErrorKind, Result};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

/// Answers every prompt with a canned reply, or fails when `healthy` is false.
struct CannedModel {
    healthy: bool,
}

#[async_trait]
impl LanguageModel for CannedModel {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> String {
        "gemini-1.5-flash".to_string()
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        if self.healthy {
            Ok("You can return items within 30 days of delivery.".to_string())
        } else {
            Err(ChatdeskError::llm(LlmErrorKind::Unavailable, "503 from upstream"))
        }
    }

    async fn health_check(&self) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(ChatdeskError::llm(LlmErrorKind::Unavailable, "unreachable"))
        }
    }
}

fn app_with(config: AppConfig, healthy: bool) -> Router {
    let agent = SupportAgent::new(
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(CannedModel { healthy }),
        PromptBuilder::default(),
    );
    chatdesk_server::build_router(Arc::new(agent), &config).unwrap()
}

fn app() -> Router {
    app_with(AppConfig::default(), true)
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn chat_message_returns_reply_envelope() {
    let app = app();
    let (status, body) = send(
        &app,
        post("/api/chat/message", r#"{"message":"What is your return policy?"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["reply"], "You can return items within 30 days of delivery.");
    assert!(body["data"]["sessionId"].as_str().unwrap().starts_with("session_"));
    assert!(body["data"]["messageId"].is_string());
    assert!(body["data"]["conversationId"].is_string());
}

#[tokio::test]
async fn follow_up_on_alias_route_keeps_conversation() {
    let app = app();
    let (_, first) = send(&app, post("/api/chat/message", r#"{"message":"Hi"}"#)).await;
    let session_id = first["data"]["sessionId"].as_str().unwrap();

    let body = json!({ "message": "Do you ship to Canada?", "sessionId": session_id }).to_string();
    let (status, second) = send(&app, post("/api/message", &body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["sessionId"], session_id);
    assert_eq!(second["data"]["conversationId"], first["data"]["conversationId"]);

    let (status, transcript) = send(&app, get(&format!("/api/conversation/{session_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transcript["data"]["sessionId"], session_id);
    assert_eq!(transcript["data"]["metadata"]["llmProvider"], "gemini");

    let messages = transcript["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["sender"], "USER");
    assert_eq!(messages[0]["text"], "Hi");
    assert_eq!(messages[1]["sender"], "AI");
    assert_eq!(messages[3]["id"], second["data"]["messageId"]);
}

#[tokio::test]
async fn input_errors_carry_codes() {
    let app = app();
    let cases = [
        (r#"{"message":"   "}"#, "EMPTY_MESSAGE"),
        (r#"{}"#, "MISSING_MESSAGE"),
        (r#"{"message":42}"#, "MISSING_MESSAGE"),
        (r#"{"message":"#, "INVALID_REQUEST"),
    ];

    for (body, code) in cases {
        let (status, json) = send(&app, post("/api/chat/message", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], code, "body {body}");
    }

    let long = json!({ "message": "a".repeat(5001) }).to_string();
    let (status, json) = send(&app, post("/api/chat/message", &long)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "MESSAGE_TOO_LONG");
    assert_eq!(json["error"], "Message is too long (maximum 5000 characters)");
}

#[tokio::test]
async fn unknown_conversation_is_404() {
    let (status, json) = send(&app(), get("/api/conversation/session_0_missing00")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn model_outage_still_answers_with_fallback() {
    let app = app_with(AppConfig::default(), false);
    let (status, body) = send(&app, post("/api/chat/message", r#"{"message":"Hello"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reply"], FALLBACK_REPLY);
}

#[tokio::test]
async fn health_reflects_dependencies() {
    let (status, body) = send(&app(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["database"], "healthy");
    assert_eq!(body["services"]["llm"], "healthy");
    assert_eq!(body["llmStatus"]["consecutiveFailures"], 0);
    assert!(body["timestamp"].is_string());

    let degraded = app_with(AppConfig::default(), false);
    let (status, body) = send(&degraded, get("/api/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["services"]["llm"], "unhealthy");
}

#[tokio::test]
async fn rate_limit_is_per_client_and_spares_health() {
    let mut config = AppConfig::default();
    config.rate_limit.max_requests = 2;
    let app = app_with(config, true);

    let from = |addr: &str| {
        let mut request = post("/api/chat/message", r#"{"message":"Hi"}"#);
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    for _ in 0..2 {
        let (status, _) = send(&app, from("192.0.2.1:5000")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app.clone().oneshot(from("192.0.2.1:5001")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "RATE_LIMITED");

    let (status, _) = send(&app, from("192.0.2.2:5000")).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..3 {
        let (status, _) = send(&app, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let app = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/chat/message")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}
