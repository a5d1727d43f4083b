//! WebSocket close codes
//!
//! Defines gateway-specific close codes for WebSocket connections.

use serde::{Deserialize, Serialize};

/// Gateway WebSocket close codes
///
/// These codes are sent in the Close frame that ends a connection to indicate the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Orderly shutdown
    Normal = 1000,
    /// Unknown error occurred
    UnknownError = 4000,
    /// Inbound frame exceeded the size limit
    FrameTooLarge = 4002,
    /// Outbound queue overflowed; the consumer was evicted
    SlowConsumer = 4008,
    /// No pong within the read deadline
    SessionTimeout = 4009,
    /// Room or gateway shutting down, or the registration was replaced
    GoingAway = 4010,
}

impl CloseCode {
    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Connection closed",
            Self::UnknownError => "Unknown error occurred",
            Self::FrameTooLarge => "Frame too large",
            Self::SlowConsumer => "Slow consumer",
            Self::SessionTimeout => "Session timeout",
            Self::GoingAway => "Going away",
        }
    }

    /// Get the name of this close code
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::UnknownError => "UnknownError",
            Self::FrameTooLarge => "FrameTooLarge",
            Self::SlowConsumer => "SlowConsumer",
            Self::SessionTimeout => "SessionTimeout",
            Self::GoingAway => "GoingAway",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.as_u16(), self.description())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
