//! Repository implementations
//!
//! Implementations of the [`MessageStore`](chat_core::MessageStore) port.

mod error;
mod memory;
mod message;

pub use memory::MemoryMessageStore;
pub use message::PgMessageStore;
