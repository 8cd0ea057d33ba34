use async_trait::async_trait;
use chatdesk_config::{LlmProvider, LlmSettings};
use chatdesk_core::{ChatdeskError, LlmErrorKind, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::classify::{classify_http_status, classify_message};
use crate::{base_url, empty_response, http_client, require_api_key, LanguageModel};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` backend.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

impl GeminiModel {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings)?,
            base_url: base_url(settings, DEFAULT_BASE_URL),
            api_key: require_api_key(settings, LlmProvider::Gemini)?,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }
}

fn transport_error(e: reqwest::Error) -> ChatdeskError {
    error!("Gemini request failed: {}", e);
    ChatdeskError::llm(classify_message(&e.to_string()), format!("Gemini request failed: {e}"))
}

async fn status_error(response: reqwest::Response) -> ChatdeskError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("Gemini returned error {}: {}", status, body);
    ChatdeskError::llm(
        classify_http_status(status, &body),
        format!("Gemini returned error {status}: {body}"),
    )
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        debug!("Sending Gemini request: {} prompt chars", prompt.chars().count());

        let response = self
            .client
            .post(format!("{}:generateContent", self.model_url()))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            ChatdeskError::llm(
                LlmErrorKind::Unavailable,
                format!("Failed to parse Gemini response: {e}"),
            )
        })?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(empty_response(LlmProvider::Gemini));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
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
