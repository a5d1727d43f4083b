//! # chat-core
//!
//! Domain layer containing identifiers, the chat message entity and the message store port.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{ChatMessage, StoredMessage, MAX_CONTENT_LEN};
pub use error::DomainError;
pub use traits::{MessageStore, RepoResult, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
pub use value_objects::{IdParseError, RoomId, UserId};
