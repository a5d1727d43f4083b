//! Per-connection limits

use chat_common::RealtimeConfig;
use std::time::Duration;

/// Timing and sizing limits applied to each connection's loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    pub max_frame_bytes: usize,
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub queue_capacity: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ConnectionLimits {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            max_frame_bytes: config.max_frame_bytes,
            write_wait: config.write_wait,
            pong_wait: config.pong_wait,
            ping_period: config.ping_period,
            queue_capacity: config.queue_capacity,
        }
    }
}
