//! StoredMessage entity <-> model mapper

use chat_core::{ChatMessage, DomainError, RoomId, StoredMessage, UserId};
use uuid::Uuid;

use crate::models::MessageModel;

/// Convert a database row to a StoredMessage entity
///
/// Rows are written by this crate, so a malformed identifier means the table
/// was modified out of band and is reported as a database error.
impl TryFrom<MessageModel> for StoredMessage {
    type Error = DomainError;

    fn try_from(model: MessageModel) -> Result<Self, Self::Error> {
        let room_id = RoomId::parse(model.room_id)
            .map_err(|e| DomainError::DatabaseError(format!("corrupt room_id: {e}")))?;
        let sender_id = UserId::parse(model.sender_id)
            .map_err(|e| DomainError::DatabaseError(format!("corrupt sender_id: {e}")))?;

        Ok(StoredMessage {
            id: model.id,
            message: ChatMessage {
                room_id,
                sender_id,
                content: model.content,
                sent_at: model.sent_at,
            },
        })
    }
}

/// Values for inserting a message row
pub struct MessageInsert<'a> {
    pub id: Uuid,
    pub room_id: &'a str,
    pub sender_id: &'a str,
    pub content: &'a str,
}

impl<'a> MessageInsert<'a> {
    pub fn new(id: Uuid, message: &'a ChatMessage) -> Self {
        Self {
            id,
            room_id: message.room_id.as_str(),
            sender_id: message.sender_id.as_str(),
            content: &message.content,
        }
    }
}
