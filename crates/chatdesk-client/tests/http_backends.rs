//! Gemini and OpenAI backends against a local mock server.

use chatdesk_client::{GeminiModel, LanguageModel, OpenAiModel};
use chatdesk_config::LlmSettings;
use chatdesk_core::{ChatdeskError, LlmErrorKind};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, provider: &str, model: &str) -> LlmSettings {
    LlmSettings {
        provider: provider.to_string(),
        api_key: Some("test-key".to_string()),
        model: model.to_string(),
        base_url: Some(server.uri()),
        ..LlmSettings::default()
    }
}

fn llm_kind(err: ChatdeskError) -> LlmErrorKind {
    match err {
        ChatdeskError::Llm { kind, .. } => kind,
        other => panic!("expected an LLM error, got {other:?}"),
    }
}

#[tokio::test]
async fn gemini_returns_candidate_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "Hello?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hi there, " }, { "text": "how can I help?" }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = GeminiModel::new(&settings(&server, "gemini", "gemini-1.5-flash")).unwrap();
    let reply = model.generate("Hello?").await.unwrap();
    assert_eq!(reply, "Hi there, how can I help?");
}

#[tokio::test]
async fn gemini_empty_candidates_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let model = GeminiModel::new(&settings(&server, "gemini", "gemini-1.5-flash")).unwrap();
    let err = model.generate("Hello?").await.unwrap_err();
    assert_eq!(llm_kind(err), LlmErrorKind::Unavailable);
}

#[tokio::test]
async fn gemini_invalid_key_is_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let model = GeminiModel::new(&settings(&server, "gemini", "gemini-1.5-flash")).unwrap();
    let err = model.generate("Hello?").await.unwrap_err();
    assert_eq!(llm_kind(err), LlmErrorKind::Authentication);
}

#[tokio::test]
async fn gemini_health_check_reads_model_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models/gemini-1.5-flash"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "models/gemini-1.5-flash" })))
        .mount(&server)
        .await;

    let model = GeminiModel::new(&settings(&server, "gemini", "gemini-1.5-flash")).unwrap();
    model.health_check().await.unwrap();
}

#[tokio::test]
async fn openai_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Returns are free within 30 days." } }]
        })))
        .mount(&server)
        .await;

    let model = OpenAiModel::new(&settings(&server, "openai", "gpt-4o-mini")).unwrap();
    let reply = model.generate("Return policy?").await.unwrap();
    assert_eq!(reply, "Returns are free within 30 days.");
}

#[tokio::test]
async fn openai_errors_are_classified() {
    let cases = [
        (401, LlmErrorKind::Authentication),
        (429, LlmErrorKind::RateLimited),
        (503, LlmErrorKind::Unavailable),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string("error"))
            .mount(&server)
            .await;

        let model = OpenAiModel::new(&settings(&server, "openai", "gpt-4o-mini")).unwrap();
        let err = model.generate("hi").await.unwrap_err();
        assert_eq!(llm_kind(err), expected, "status {status}");
    }
}

#[tokio::test]
async fn openai_null_content_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        })))
        .mount(&server)
        .await;

    let model = OpenAiModel::new(&settings(&server, "openai", "gpt-4o-mini")).unwrap();
    let err = model.generate("hi").await.unwrap_err();
    assert_eq!(llm_kind(err), LlmErrorKind::Unavailable);
}
