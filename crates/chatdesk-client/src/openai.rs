use async_trait::async_trait;
use chatdesk_config::{LlmProvider, LlmSettings};
use chatdesk_core::{ChatdeskError, LlmErrorKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::classify::{classify_http_status, classify_message};
use crate::{base_url, empty_response, http_client, require_api_key, LanguageModel};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI-compatible chat completions backend.
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiModel {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: base_url(settings, DEFAULT_BASE_URL),
            api_key: require_api_key(settings, LlmProvider::OpenAi)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

fn transport_error(e: reqwest::Error) -> ChatdeskError {
    error!("OpenAI request failed: {}", e);
    ChatdeskError::llm(classify_message(&e.to_string()), format!("OpenAI request failed: {e}"))
}

async fn status_error(response: reqwest::Response) -> ChatdeskError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("OpenAI returned error {}: {}", status, body);
    ChatdeskError::llm(
        classify_http_status(status, &body),
        format!("OpenAI returned error {status}: {body}"),
    )
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending OpenAI request to model {}", self.model);

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            ChatdeskError::llm(
                LlmErrorKind::Unavailable,
                format!("Failed to parse OpenAI response: {e}"),
            )
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(empty_response(LlmProvider::OpenAi));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/v1/models/{}", self.base_url, self.model))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }
}
