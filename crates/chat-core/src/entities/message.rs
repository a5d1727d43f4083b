//! Chat message entity - the unit of room fan-out and persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::value_objects::{RoomId, UserId};

/// Maximum content length accepted for a single chat line (bytes)
///
/// Matches the largest inbound WebSocket frame the gateway reads.
pub const MAX_CONTENT_LEN: usize = 512;

/// A chat line sent by one member of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message stamped with the current time
    pub fn new(room_id: RoomId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            room_id,
            sender_id,
            content: content.into(),
            sent_at: Utc::now(),
        }
    }

    /// Check the content against domain rules
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.content.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "message content is empty".to_string(),
            ));
        }
        if self.content.len() > MAX_CONTENT_LEN {
            return Err(DomainError::ContentTooLong {
                max: MAX_CONTENT_LEN,
            });
        }
        Ok(())
    }

    /// Get a truncated preview of the content (for notifications and logs)
    pub fn preview(&self, max_len: usize) -> &str {
        if self.content.len() <= max_len {
            &self.content
        } else {
            let mut end = max_len;
            while !self.content.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            &self.content[..end]
        }
    }
}

/// A message after it has been appended to the message store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    #[serde(flatten)]
    pub message: ChatMessage,
}

impl StoredMessage {
    /// Wrap a message with a freshly generated record id
    pub fn assign(message: ChatMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
        }
    }
}
