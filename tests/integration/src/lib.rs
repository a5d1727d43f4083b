//! Integration test utilities for the chat gateway
//!
//! This crate provides helpers for running end-to-end tests against
//! the HTTP routes and WebSocket endpoints over real sockets.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
