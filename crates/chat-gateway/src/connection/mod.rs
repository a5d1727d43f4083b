//! WebSocket connection management
//!
//! A connection owns one socket, one bounded outbound queue, and a read/write
//! loop pair driven by a single connection task.

mod connection;
mod error;
mod pump;
mod queue;

pub use connection::{serve_connection, Connection, ConnectionScope};
pub use error::ConnectionError;
pub use pump::{coalesce, normalize_line, read_loop, write_loop};
pub use queue::{ConnectionId, EnqueueError, OutboundQueue};
