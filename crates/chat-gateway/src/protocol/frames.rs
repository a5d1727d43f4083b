//! Outbound frame payloads
//!
//! Every frame is a JSON object tagged by `type`. Frames are encoded once and
//! shared between recipients as [`Frame`].

use chat_core::{ChatMessage, DomainError, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An encoded text frame, shared by every queue it is delivered to
pub type Frame = Arc<str>;

/// Error code carried by a persistence failure frame
pub const PERSISTENCE_FAILED: &str = "PERSISTENCE_FAILED";

/// Frames sent from the gateway to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A chat line fanned out to room members
    Message {
        room_id: RoomId,
        sender_id: UserId,
        content: String,
        sent_at: DateTime<Utc>,
    },
    /// Out-of-room notification that a room received a new line
    ///
    /// Notification clients read camelCase keys.
    #[serde(rename_all = "camelCase")]
    NewMessage {
        room_id: RoomId,
        sender_id: UserId,
        sent_at: DateTime<Utc>,
    },
    /// Error reported back to the sender
    Error {
        code: String,
        room_id: RoomId,
        message: String,
    },
}

impl ServerFrame {
    /// Room fan-out frame for a chat line
    pub fn message(message: &ChatMessage) -> Self {
        Self::Message {
            room_id: message.room_id.clone(),
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            sent_at: message.sent_at,
        }
    }

    /// Notification frame for a chat line; carries no content
    pub fn new_message(message: &ChatMessage) -> Self {
        Self::NewMessage {
            room_id: message.room_id.clone(),
            sender_id: message.sender_id.clone(),
            sent_at: message.sent_at,
        }
    }

    /// Frame telling a sender its line was delivered but not stored
    pub fn persistence_failed(room_id: &RoomId, error: &DomainError) -> Self {
        Self::Error {
            code: PERSISTENCE_FAILED.to_string(),
            room_id: room_id.clone(),
            message: error.to_string(),
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize into a shareable frame
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        self.to_json().map(Frame::from)
    }
}
