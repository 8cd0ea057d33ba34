pub mod manager;
pub mod memory;
pub mod metadata;
pub mod storage;

pub use manager::{generate_session_id, ConversationManager, HISTORY_LIMIT};
pub use memory::InMemoryConversationStore;
pub use metadata::{Conversation, ConversationMetadata, ConversationSummary, ConversationTranscript};
pub use storage::{ConversationStore, SqliteConversationStore};
