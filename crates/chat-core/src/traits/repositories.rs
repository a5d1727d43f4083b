//! Repository traits (ports) - define the interface for data access
//!
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation.

use async_trait::async_trait;

use crate::entities::{ChatMessage, StoredMessage};
use crate::error::DomainError;
use crate::value_objects::RoomId;

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

/// Default number of messages returned by a history query
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Upper bound on a single history query
pub const MAX_HISTORY_LIMIT: i64 = 200;

// ============================================================================
// Message Store
// ============================================================================

/// Durable append-only store for chat messages, keyed by room
///
/// Real-time delivery never waits on this store; the gateway calls
/// [`MessageStore::append`] from a detached task.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message and return the stored record
    async fn append(&self, message: &ChatMessage) -> RepoResult<StoredMessage>;

    /// List the most recent messages of a room, oldest first
    ///
    /// `limit` is clamped to `1..=MAX_HISTORY_LIMIT`.
    async fn list_by_room(&self, room_id: &RoomId, limit: i64) -> RepoResult<Vec<StoredMessage>>;
}
