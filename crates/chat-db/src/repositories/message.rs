//! PostgreSQL implementation of MessageStore

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use chat_core::traits::{MessageStore, RepoResult, MAX_HISTORY_LIMIT};
use chat_core::{ChatMessage, RoomId, StoredMessage};

use crate::mappers::MessageInsert;
use crate::models::MessageModel;

use super::error::map_db_error;

/// PostgreSQL implementation of MessageStore
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Create a new PgMessageStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    #[instrument(skip(self, message), fields(room_id = %message.room_id, sender_id = %message.sender_id))]
    async fn append(&self, message: &ChatMessage) -> RepoResult<StoredMessage> {
        let insert = MessageInsert::new(Uuid::new_v4(), message);

        let row = sqlx::query_as::<_, MessageModel>(
            r#"
            INSERT INTO messages (id, room_id, sender_id, content, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, room_id, sender_id, content, sent_at
            "#,
        )
        .bind(insert.id)
        .bind(insert.room_id)
        .bind(insert.sender_id)
        .bind(insert.content)
        .bind(message.sent_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        StoredMessage::try_from(row)
    }

    #[instrument(skip(self))]
    async fn list_by_room(&self, room_id: &RoomId, limit: i64) -> RepoResult<Vec<StoredMessage>> {
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);

        // Latest N, newest first; reversed below so callers get chronological order
        let rows = sqlx::query_as::<_, MessageModel>(
            r#"
            SELECT id, room_id, sender_id, content, sent_at
            FROM messages
            WHERE room_id = $1
            ORDER BY sent_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(room_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter()
            .rev()
            .map(StoredMessage::try_from)
            .collect()
    }
}
