//! # chat-gateway
//!
//! WebSocket gateway for real-time room chat and per-user notifications.
//!
//! - [`connection`]: per-socket read/write loops and the bounded outbound queue
//! - [`room`]: one actor task per conversation, serializing membership and fan-out
//! - [`hub`]: directory of live rooms with atomic create-once lookup
//! - [`registry`]: user id to outbound queue map for out-of-room notifications

pub mod connection;
pub mod handlers;
pub mod hub;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod server;

pub use server::{create_app, create_gateway_state, run, GatewayState};
