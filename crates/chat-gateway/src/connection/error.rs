//! Connection error types

use crate::protocol::CloseCode;
use thiserror::Error;

/// Why a connection's read or write loop ended
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Socket read or write failed
    #[error("Socket error: {0}")]
    Socket(String),

    /// No pong arrived before the read deadline
    #[error("Read deadline expired")]
    ReadTimeout,

    /// A write did not complete within the write deadline
    #[error("Write deadline expired")]
    WriteTimeout,

    /// Inbound frame exceeded the configured size limit
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Peer sent a Close frame or ended the stream
    #[error("Closed by peer")]
    ClosedByPeer,
}

impl ConnectionError {
    /// Close code reported to the peer for this error
    pub fn close_code(&self) -> CloseCode {
        match self {
            Self::Socket(_) | Self::WriteTimeout => CloseCode::UnknownError,
            Self::ReadTimeout => CloseCode::SessionTimeout,
            Self::FrameTooLarge { .. } => CloseCode::FrameTooLarge,
            Self::ClosedByPeer => CloseCode::Normal,
        }
    }

    /// Whether this is an ordinary disconnect rather than a failure
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::ClosedByPeer)
    }
}
