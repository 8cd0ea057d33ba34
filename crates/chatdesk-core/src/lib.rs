use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "AI")]
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "USER",
            Sender::Ai => "AI",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sender {
    type Err = ChatdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(Sender::User),
            "AI" => Ok(Sender::Ai),
            other => Err(ChatdeskError::Storage(format!("Unknown message sender: {other}"))),
        }
    }
}

/// A single immutable chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(conversation_id: Uuid, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(conversation_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(conversation_id, Sender::User, text)
    }

    pub fn ai(conversation_id: Uuid, text: impl Into<String>) -> Self {
        Self::new(conversation_id, Sender::Ai, text)
    }
}

/// Result of handling one inbound chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub session_id: String,
    pub message_id: Uuid,
    pub conversation_id: Uuid,
}

/// Stable machine-readable codes for rejected client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCode {
    EmptyMessage,
    MessageTooLong,
    MissingMessage,
    InvalidRequest,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCode::EmptyMessage => "EMPTY_MESSAGE",
            ValidationCode::MessageTooLong => "MESSAGE_TOO_LONG",
            ValidationCode::MissingMessage => "MISSING_MESSAGE",
            ValidationCode::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse buckets for language model failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    Authentication,
    RateLimited,
    Unavailable,
}

impl LlmErrorKind {
    /// Opaque message that is safe to show to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            LlmErrorKind::Authentication => {
                "AI service authentication failed. Please check the API key configuration."
            }
            LlmErrorKind::RateLimited => "AI service is busy right now. Please try again shortly.",
            LlmErrorKind::Unavailable => {
                "AI service is temporarily unavailable. Please try again later."
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ChatdeskError {
    #[error("{message}")]
    Validation {
        code: ValidationCode,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{}", kind.user_message())]
    Llm { kind: LlmErrorKind, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatdeskError {
    pub fn validation(code: ValidationCode, message: impl Into<String>) -> Self {
        ChatdeskError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn llm(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        ChatdeskError::Llm {
            kind,
            message: message.into(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ChatdeskError::Validation { .. } | ChatdeskError::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatdeskError>;
