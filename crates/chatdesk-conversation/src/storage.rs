use async_trait::async_trait;
use chatdesk_core::{ChatdeskError, Message, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::metadata::{Conversation, ConversationMetadata, ConversationSummary};

/// Persistence seam for conversations and their messages.
///
/// Implementations must keep `session_id` unique and return messages in
/// creation order.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Conversation>>;

    /// Fails if the session id is already taken.
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn touch_conversation(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// Up to `limit` most recent messages, oldest first.
    async fn recent_messages(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<Message>>;

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>>;

    /// Most recently updated first.
    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>>;

    /// Removes the conversation and, by cascade, its messages.
    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    sender TEXT NOT NULL CHECK (sender IN ('USER', 'AI')),
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
    ON messages(conversation_id, created_at);
"#;

/// SQLite-backed conversation store.
///
/// A single connection guarded by a mutex; queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConversationStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).map_err(db_error)?;
        let store = Self::init(conn)?;
        info!("Conversation store opened at {:?}", db_path);
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ChatdeskError::Storage("Database connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| ChatdeskError::Storage(format!("Database task failed: {e}")))?
    }
}

fn db_error(e: rusqlite::Error) -> ChatdeskError {
    ChatdeskError::Storage(e.to_string())
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ChatdeskError::Storage(format!("Invalid timestamp '{raw}': {e}")))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| ChatdeskError::Storage(format!("Invalid id '{raw}': {e}")))
}

struct ConversationRow {
    id: String,
    session_id: String,
    created_at: String,
    updated_at: String,
    metadata: String,
}

impl ConversationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            metadata: row.get(4)?,
        })
    }

    fn into_conversation(self) -> Result<Conversation> {
        Ok(Conversation {
            id: parse_uuid(&self.id)?,
            session_id: self.session_id,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            metadata: ConversationMetadata::from_json(&self.metadata)?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    sender: String,
    text: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender: row.get(2)?,
            text: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_uuid(&self.id)?,
            conversation_id: parse_uuid(&self.conversation_id)?,
            sender: self.sender.parse()?,
            text: self.text,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn collect_messages(rows: Vec<MessageRow>) -> Result<Vec<Message>> {
    rows.into_iter().map(MessageRow::into_message).collect()
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Conversation>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, session_id, created_at, updated_at, metadata
                     FROM conversations WHERE session_id = ?1",
                    params![session_id],
                    ConversationRow::from_row,
                )
                .optional()
                .map_err(db_error)?;
            row.map(ConversationRow::into_conversation).transpose()
        })
        .await
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<()> {
        let id = conversation.id.to_string();
        let session_id = conversation.session_id.clone();
        let created_at = format_timestamp(&conversation.created_at);
        let updated_at = format_timestamp(&conversation.updated_at);
        let metadata = conversation.metadata.to_json()?;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO conversations (id, session_id, created_at, updated_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, session_id, created_at, updated_at, metadata],
            )
            .map_err(db_error)?;
            debug!("Inserted conversation {} for session {}", id, session_id);
            Ok(())
        })
        .await
    }

    async fn touch_conversation(&self, conversation_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let id = conversation_id.to_string();
        let at = format_timestamp(&at);
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                    params![at, id],
                )
                .map_err(db_error)?;
            if changed == 0 {
                return Err(ChatdeskError::NotFound(format!("Conversation {id}")));
            }
            Ok(())
        })
        .await
    }

    async fn insert_message(&self, message: &Message) -> Result<()> {
        let id = message.id.to_string();
        let conversation_id = message.conversation_id.to_string();
        let sender = message.sender.as_str();
        let text = message.text.clone();
        let created_at = format_timestamp(&message.created_at);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, conversation_id, sender, text, created_at],
            )
            .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<Message>> {
        let id = conversation_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, sender, text, created_at
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?2",
                )
                .map_err(db_error)?;
            let mut rows = stmt
                .query_map(params![id, limit], MessageRow::from_row)
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;
            rows.reverse();
            collect_messages(rows)
        })
        .await
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, sender, text, created_at
                     FROM messages WHERE conversation_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![id], MessageRow::from_row)
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;
            collect_messages(rows)
        })
        .await
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT c.id, c.session_id, c.created_at, c.updated_at,
                            (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
                     FROM conversations c
                     ORDER BY c.updated_at DESC
                     LIMIT ?1",
                )
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(db_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_error)?;

            rows.into_iter()
                .map(|(id, session_id, created_at, updated_at, count)| {
                    Ok(ConversationSummary {
                        id: parse_uuid(&id)?,
                        session_id,
                        created_at: parse_timestamp(&created_at)?,
                        updated_at: parse_timestamp(&updated_at)?,
                        message_count: usize::try_from(count).unwrap_or_default(),
                    })
                })
                .collect()
        })
        .await
    }

    async fn delete_conversation(&self, conversation_id: Uuid) -> Result<bool> {
        let id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn
                .execute("DELETE FROM conversations WHERE id = ?1", params![id])
                .map_err(db_error)?;
            if deleted > 0 {
                info!("Deleted conversation {}", id);
            }
            Ok(deleted > 0)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(db_error)?;
            Ok(())
        })
        .await
    }
}
