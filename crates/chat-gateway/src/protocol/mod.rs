//! Wire protocol
//!
//! Outbound frame shapes, close codes and per-connection limits.

mod close_codes;
mod frames;
mod limits;

pub use close_codes::CloseCode;
pub use frames::{Frame, ServerFrame, PERSISTENCE_FAILED};
pub use limits::ConnectionLimits;
