//! Room actors
//!
//! Each live room is one task that owns its member map. Membership changes and
//! broadcasts are commands on a single channel, which gives every room a total
//! order without locks.

mod actor;
mod handle;

pub use actor::{spawn_room, IdleHook, ROOM_COMMAND_BUFFER};
pub use handle::{RoomError, RoomHandle};

pub(crate) use handle::RoomCommand;
