//! Handler error types

use chat_core::DomainError;
use thiserror::Error;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Line rejected by domain rules
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Outbound frame could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Connection is not attached to a room
    #[error("Connection has no room")]
    NoRoom,
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
