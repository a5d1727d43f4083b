//! Message database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: Uuid,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}
