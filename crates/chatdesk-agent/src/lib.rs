use chatdesk_client::LanguageModel;
use chatdesk_config::AppConfig;
use chatdesk_conversation::{
    ConversationManager, ConversationMetadata, ConversationStore, ConversationSummary,
    ConversationTranscript,
};
use chatdesk_core::{ChatReply, ChatdeskError, LlmErrorKind, Result, ValidationCode};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub mod knowledge;
pub mod prompt;
pub mod status;

pub use knowledge::{load_knowledge, DEFAULT_KNOWLEDGE};
pub use prompt::{truncate_chars, PromptBuilder, MAX_QUESTION_CHARS, TRANSCRIPT_WINDOW};
pub use status::{LlmStatus, LlmStatusSnapshot};

/// Longest accepted customer message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Stored and returned in place of a model reply when generation fails.
pub const FALLBACK_REPLY: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
}

impl ServiceHealth {
    fn from_probe(probe: &Result<()>) -> Self {
        if probe.is_ok() {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Unhealthy
        }
    }
}

/// Outcome of probing the store and the language model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub database: ServiceHealth,
    pub llm: ServiceHealth,
    pub llm_status: LlmStatusSnapshot,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database == ServiceHealth::Healthy && self.llm == ServiceHealth::Healthy
    }
}

/// Check an inbound message and return the text that gets stored.
///
/// Length is measured in characters on the text as received.
pub fn validate_message(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatdeskError::validation(
            ValidationCode::EmptyMessage,
            "Message cannot be empty",
        ));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatdeskError::validation(
            ValidationCode::MessageTooLong,
            format!("Message is too long (maximum {MAX_MESSAGE_CHARS} characters)"),
        ));
    }
    Ok(trimmed)
}

/// Answers customer messages: persists both sides of each exchange and
/// asks the language model for the reply.
pub struct SupportAgent {
    conversations: ConversationManager,
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    llm_status: LlmStatus,
}

impl SupportAgent {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn LanguageModel>,
        prompts: PromptBuilder,
    ) -> Self {
        Self {
            conversations: ConversationManager::new(store),
            model,
            prompts,
            llm_status: LlmStatus::new(),
        }
    }

    /// Build an agent whose knowledge text follows `config.support`.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let knowledge = load_knowledge(config.support.knowledge_file.as_deref())?;
        Ok(Self::new(store, model, PromptBuilder::new(knowledge)))
    }

    pub fn conversations(&self) -> &ConversationManager {
        &self.conversations
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn process_message(&self, text: &str, session_id: Option<&str>) -> Result<ChatReply> {
        let text = validate_message(text)?;

        let metadata = ConversationMetadata::new(self.model.provider().as_str(), self.model.model());
        let conversation = self
            .conversations
            .resolve_session(session_id, metadata)
            .await?;

        // The current message is part of the history read below; the prompt
        // carries it a second time as the question.
        self.conversations
            .add_user_message(conversation.id, text)
            .await?;
        let history = self.conversations.recent_history(conversation.id).await?;
        debug!("Loaded {} history messages", history.len());

        let prompt = self.prompts.build(&history, text);
        let reply = self.generate_reply(&prompt).await;

        let ai_message = self
            .conversations
            .add_ai_message(conversation.id, &reply)
            .await?;
        self.conversations.touch(conversation.id).await?;

        info!(
            "Answered message in session {} ({} chars)",
            conversation.session_id,
            reply.chars().count()
        );

        Ok(ChatReply {
            reply,
            session_id: conversation.session_id,
            message_id: ai_message.id,
            conversation_id: conversation.id,
        })
    }

    async fn generate_reply(&self, prompt: &str) -> String {
        match self.model.generate(prompt).await {
            Ok(reply) => {
                self.llm_status.record_success();
                reply
            }
            Err(e) => {
                let kind = match &e {
                    ChatdeskError::Llm { kind, message } => {
                        warn!("Language model failed ({}): {}", kind.user_message(), message);
                        *kind
                    }
                    other => {
                        warn!("Language model failed: {}", other);
                        LlmErrorKind::Unavailable
                    }
                };
                self.llm_status.record_fallback(kind);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    pub async fn get_conversation(&self, session_id: &str) -> Result<ConversationTranscript> {
        self.conversations.load_transcript(session_id).await
    }

    pub async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        self.conversations.list_conversations(limit).await
    }

    pub fn llm_status(&self) -> LlmStatusSnapshot {
        self.llm_status.snapshot()
    }

    /// Probe the store and the model. Fallback history is reported but does
    /// not affect either verdict.
    pub async fn health(&self) -> HealthReport {
        let database = self.conversations.store().ping().await;
        if let Err(e) = &database {
            warn!("Store health check failed: {}", e);
        }
        let llm = self.model.health_check().await;
        if let Err(e) = &llm {
            warn!("Language model health check failed: {}", e);
        }

        HealthReport {
            database: ServiceHealth::from_probe(&database),
            llm: ServiceHealth::from_probe(&llm),
            llm_status: self.llm_status.snapshot(),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: ChatdeskError) -> ValidationCode {
        match err {
            ChatdeskError::Validation { code, .. } => code,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_messages_are_rejected() {
        for text in ["", "   ", "\n\t "] {
            let err = validate_message(text).unwrap_err();
            assert_eq!(code_of(err), ValidationCode::EmptyMessage);
        }
        assert_eq!(
            validate_message(" ").unwrap_err().to_string(),
            "Message cannot be empty"
        );
    }

    #[test]
    fn length_limit_counts_characters() {
        let at_limit = "ü".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_message(&at_limit).is_ok());

        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        let err = validate_message(&over).unwrap_err();
        assert_eq!(err.to_string(), "Message is too long (maximum 5000 characters)");
        assert_eq!(code_of(err), ValidationCode::MessageTooLong);
    }

    #[test]
    fn accepted_text_is_trimmed() {
        assert_eq!(validate_message("  Do you ship to Canada?\n").unwrap(), "Do you ship to Canada?");
    }
}
