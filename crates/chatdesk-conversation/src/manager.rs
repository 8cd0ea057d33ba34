use chatdesk_core::{ChatdeskError, Message, Result, Sender};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::metadata::{Conversation, ConversationMetadata, ConversationSummary, ConversationTranscript};
use crate::storage::ConversationStore;

/// Number of prior messages read back as prompt context.
pub const HISTORY_LIMIT: usize = 10;

const SESSION_SUFFIX_LEN: usize = 9;

/// Mint a new session identifier: `session_<unix millis>_<9 base36 chars>`.
///
/// Uniqueness is best effort; the store's unique constraint is the backstop.
pub fn generate_session_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|b| char::from(b).to_ascii_lowercase())
        .take(SESSION_SUFFIX_LEN)
        .collect();
    format!("session_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Manages conversation state on top of a [`ConversationStore`].
#[derive(Clone)]
pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
}

impl ConversationManager {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Reuse the conversation for a known session id, otherwise start a new
    /// one under a freshly minted session id.
    pub async fn resolve_session(
        &self,
        session_id: Option<&str>,
        metadata: ConversationMetadata,
    ) -> Result<Conversation> {
        let requested = session_id.map(str::trim).filter(|s| !s.is_empty());

        if let Some(session_id) = requested {
            if let Some(conversation) = self.store.find_by_session(session_id).await? {
                debug!(
                    "Resumed conversation {} for session {}",
                    conversation.id, session_id
                );
                return Ok(conversation);
            }
            debug!("Unknown session {}, starting a new conversation", session_id);
        }

        let conversation = Conversation::new(generate_session_id(), metadata);
        self.store.insert_conversation(&conversation).await?;

        info!(
            "Started new conversation {} with session {}",
            conversation.id, conversation.session_id
        );
        Ok(conversation)
    }

    pub async fn add_user_message(&self, conversation_id: Uuid, text: &str) -> Result<Message> {
        self.append(conversation_id, Sender::User, text).await
    }

    pub async fn add_ai_message(&self, conversation_id: Uuid, text: &str) -> Result<Message> {
        self.append(conversation_id, Sender::Ai, text).await
    }

    async fn append(&self, conversation_id: Uuid, sender: Sender, text: &str) -> Result<Message> {
        let message = Message::new(conversation_id, sender, text);
        self.store.insert_message(&message).await?;
        debug!("Appended {} message to conversation {}", sender, conversation_id);
        Ok(message)
    }

    /// The last [`HISTORY_LIMIT`] messages, oldest first.
    pub async fn recent_history(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        self.store
            .recent_messages(conversation_id, HISTORY_LIMIT)
            .await
    }

    pub async fn touch(&self, conversation_id: Uuid) -> Result<()> {
        self.store
            .touch_conversation(conversation_id, Utc::now())
            .await
    }

    pub async fn load_transcript(&self, session_id: &str) -> Result<ConversationTranscript> {
        let conversation = self
            .store
            .find_by_session(session_id)
            .await?
            .ok_or_else(|| ChatdeskError::NotFound(format!("Conversation not found: {session_id}")))?;
        let messages = self.store.messages(conversation.id).await?;

        Ok(ConversationTranscript {
            conversation,
            messages,
        })
    }

    pub async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        self.store.list_conversations(limit).await
    }
}
