//! In-memory conversation store for tests and ephemeral runs.

use async_trait::async_trait;
use chatdesk_core::{ChatdeskError, Message, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::metadata::{Conversation, ConversationSummary};
use crate::storage::ConversationStore;

#[derive(Debug, Default)]
struct MemoryState {
    conversations: HashMap<Uuid, Conversation>,
    sessions: HashMap<String, Uuid>,
    messages: HashMap<Uuid, Vec<Message>>,
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    state: RwLock<MemoryState>,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| ChatdeskError::Storage("In-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| ChatdeskError::Storage("In-memory store lock poisoned".into()))
    }

    /// Total number of stored messages across all conversations.
    pub fn message_count(&self) -> Result<usize> {
        Ok(self.read()?.messages.values().map(Vec::len).sum())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Conversation>> {
        let state = self.read()?;
        Ok(state
            .sessions
            .get(session_id)
            .and_then(|id| state.conversations.get(id))
            .cloned())
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut state = self.write()?;
        if state.sessions.contains_key(&conversation.session_id) {
            return Err(ChatdeskError::Storage(format!(
                "Session id already exists: {}",
                conversation.session_id
            )));
        }
        state
            .sessions
            .insert(conversation.session_id.clone(), conversation.id);
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn touch_conversation(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.write()?;
        let conversation = state
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| ChatdeskError::NotFound(format!("Conversation {conversation_id}")))?;
        conversation.updated_at = at;
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        let mut state = self.write()?;
        if !state.conversations.contains_key(&message.conversation_id) {
            return Err(ChatdeskError::Storage(format!(
                "Conversation {} does not exist",
                message.conversation_id
            )));
        }
        state
            .messages
            .entry(message.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<Message>> {
        let state = self.read()?;
        let messages = state
            .messages
            .get(&conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let state = self.read()?;
        Ok(state
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        let state = self.read()?;
        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id,
                session_id: c.session_id.clone(),
                created_at: c.created_at,
                updated_at: c.updated_at,
                message_count: state.messages.get(&c.id).map_or(0, Vec::len),
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<bool> {
        let mut state = self.write()?;
        match state.conversations.remove(&conversation_id) {
            Some(conversation) => {
                state.sessions.remove(&conversation.session_id);
                state.messages.remove(&conversation_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.read().map(|_| ())
    }
}
