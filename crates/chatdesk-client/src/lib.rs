use async_trait::async_trait;
use chatdesk_config::{LlmProvider, LlmSettings};
use chatdesk_core::{ChatdeskError, LlmErrorKind, Result};
use std::sync::Arc;
use tracing::info;

mod bedrock;
mod classify;
mod gemini;
mod openai;

pub use bedrock::BedrockModel;
pub use classify::{classify_error_code, classify_http_status, classify_message};
pub use gemini::GeminiModel;
pub use openai::OpenAiModel;

/// A hosted text-generation backend.
///
/// Implementations return plain text and map every failure to
/// [`ChatdeskError::Llm`]; they never retry.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider(&self) -> LlmProvider;

    fn model(&self) -> String;

    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Cheap reachability probe.
    async fn health_check(&self) -> Result<()>;
}

/// Build the configured backend. Called once at start-up.
pub async fn create_language_model(settings: &LlmSettings) -> Result<Arc<dyn LanguageModel>> {
    let provider = settings.provider_kind()?;

    let model: Arc<dyn LanguageModel> = match provider {
        LlmProvider::Gemini => Arc::new(GeminiModel::new(settings)?),
        LlmProvider::OpenAi => Arc::new(OpenAiModel::new(settings)?),
        LlmProvider::Bedrock => Arc::new(BedrockModel::new(settings).await?),
    };

    info!("Language model ready: {} ({})", provider, model.model());
    Ok(model)
}

pub(crate) fn require_api_key(settings: &LlmSettings, provider: LlmProvider) -> Result<String> {
    settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ChatdeskError::Config(format!("An API key is required for the {provider} provider"))
        })
}

pub(crate) fn http_client(settings: &LlmSettings) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.timeout())
        .build()
        .map_err(|e| ChatdeskError::Config(format!("Failed to build HTTP client: {e}")))
}

pub(crate) fn base_url(settings: &LlmSettings, default: &str) -> String {
    settings
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

pub(crate) fn empty_response(provider: LlmProvider) -> ChatdeskError {
    ChatdeskError::llm(
        LlmErrorKind::Unavailable,
        format!("Empty response from {provider}"),
    )
}
