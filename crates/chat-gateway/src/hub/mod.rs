//! Room directory
//!
//! Looks up or lazily creates room actors by id and routes messages to them.

mod directory;

pub use directory::{Hub, JoinError, JOIN_ATTEMPTS};
