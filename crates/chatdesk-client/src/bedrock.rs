use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_bedrockruntime as bedrock;
use aws_sdk_bedrockruntime::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::operation::converse::ConverseOutput;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, InferenceConfiguration, Message};
use chatdesk_config::{LlmProvider, LlmSettings};
use chatdesk_core::{ChatdeskError, LlmErrorKind, Result};
use tracing::{debug, info, warn};

use crate::classify::classify_error_code;
use crate::{empty_response, LanguageModel};

const DEFAULT_REGION: &str = "us-east-1";

/// AWS Bedrock Converse backend. Credentials come from the standard AWS chain.
pub struct BedrockModel {
    client: bedrock::Client,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl BedrockModel {
    pub async fn new(settings: &LlmSettings) -> Result<Self> {
        let region = settings
            .region
            .clone()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));
        if let Some(profile) = &settings.profile {
            info!("Using AWS profile: {}", profile);
            loader = loader.profile_name(profile);
        }
        let aws_config = loader.load().await;
        debug!("AWS config loaded for region: {}", region);

        Ok(Self {
            client: bedrock::Client::new(&aws_config),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    async fn converse(&self, prompt: &str, max_tokens: u32) -> Result<ConverseOutput> {
        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(prompt.to_string()))
            .build()
            .map_err(|e| ChatdeskError::llm(LlmErrorKind::Unavailable, e.to_string()))?;

        let inference_config = InferenceConfiguration::builder()
            .max_tokens(i32::try_from(max_tokens).unwrap_or(i32::MAX))
            .temperature(self.temperature)
            .build();

        self.client
            .converse()
            .model_id(&self.model)
            .messages(message)
            .inference_config(inference_config)
            .send()
            .await
            .map_err(sdk_error)
    }
}

fn sdk_error<E, R>(e: SdkError<E, R>) -> ChatdeskError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = e.code().map(str::to_string);
    let detail = DisplayErrorContext(&e).to_string();
    warn!("Bedrock API error ({:?}): {}", code, detail);
    ChatdeskError::llm(
        classify_error_code(code.as_deref(), &detail),
        format!("Bedrock API error: {detail}"),
    )
}

fn response_text(output: &ConverseOutput) -> String {
    output
        .output()
        .and_then(|o| o.as_message().ok())
        .map(|message| {
            message
                .content()
                .iter()
                .filter_map(|block| block.as_text().ok().cloned())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LanguageModel for BedrockModel {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Bedrock
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let output = self.converse(prompt, self.max_tokens).await?;
        let text = response_text(&output);
        if text.trim().is_empty() {
            return Err(empty_response(LlmProvider::Bedrock));
        }
        Ok(text)
    }

    async fn health_check(&self) -> Result<()> {
        self.converse("ping", 1).await.map(|_| ())
    }
}
