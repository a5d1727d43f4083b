//! In-memory implementation of MessageStore
//!
//! Used when no database is configured and by tests. Contents are lost on restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::instrument;

use chat_core::traits::{MessageStore, RepoResult, MAX_HISTORY_LIMIT};
use chat_core::{ChatMessage, RoomId, StoredMessage};

/// Process-local message log
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across all rooms
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    #[instrument(skip(self, message), fields(room_id = %message.room_id))]
    async fn append(&self, message: &ChatMessage) -> RepoResult<StoredMessage> {
        let stored = StoredMessage::assign(message.clone());
        self.messages.write().push(stored.clone());
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn list_by_room(&self, room_id: &RoomId, limit: i64) -> RepoResult<Vec<StoredMessage>> {
        let limit = usize::try_from(limit.clamp(1, MAX_HISTORY_LIMIT)).unwrap_or(1);

        // Appends run on detached tasks and may land out of order; the
        // stable sort keeps insertion order for equal timestamps
        let mut room: Vec<StoredMessage> = self
            .messages
            .read()
            .iter()
            .filter(|m| &m.message.room_id == room_id)
            .cloned()
            .collect();
        room.sort_by_key(|m| m.message.sent_at);

        let skip = room.len().saturating_sub(limit);
        Ok(room.split_off(skip))
    }
}
