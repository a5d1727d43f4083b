//! Domain entities - core business objects

mod message;

pub use message::{ChatMessage, StoredMessage, MAX_CONTENT_LEN};
