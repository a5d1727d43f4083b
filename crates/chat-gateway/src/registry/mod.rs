//! Global user registry
//!
//! Maps each user id to the outbound queue of its notification connection.

mod global;

pub use global::GlobalRegistry;
