//! Room handle and commands

use chat_core::{ChatMessage, RoomId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::connection::{ConnectionId, OutboundQueue};

/// Commands processed by a room actor, in arrival order
pub(crate) enum RoomCommand {
    Register {
        member: OutboundQueue,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        connection_id: ConnectionId,
        ack: oneshot::Sender<bool>,
    },
    Broadcast {
        message: ChatMessage,
        origin: Option<ConnectionId>,
    },
    Members {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
    Shutdown,
}

/// Room errors
#[derive(Debug, Clone, Error)]
pub enum RoomError {
    /// The actor stopped before the command was processed
    #[error("Room {0} has shut down")]
    Closed(RoomId),
}

/// Cloneable address of a running room actor
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    epoch: u64,
    commands: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(room_id: RoomId, epoch: u64, commands: mpsc::Sender<RoomCommand>) -> Self {
        Self {
            room_id,
            epoch,
            commands,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.room_id
    }

    /// Instance number; a recreated room with the same id gets a new epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the actor has stopped accepting commands
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn closed(&self) -> RoomError {
        RoomError::Closed(self.room_id.clone())
    }

    /// Add a member and wait until the actor has recorded it
    pub async fn register(&self, member: OutboundQueue) -> Result<(), RoomError> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(RoomCommand::Register { member, ack })
            .await
            .map_err(|_| self.closed())?;
        done.await.map_err(|_| self.closed())
    }

    /// Remove a member, closing its queue
    ///
    /// Returns `true` if the connection was a member. Safe to call repeatedly.
    pub async fn unregister(&self, connection_id: ConnectionId) -> bool {
        let (ack, done) = oneshot::channel();
        if self
            .commands
            .send(RoomCommand::Unregister { connection_id, ack })
            .await
            .is_err()
        {
            return false;
        }
        done.await.unwrap_or(false)
    }

    /// Fan a message out to the current members
    ///
    /// `origin` is the sending connection, skipped when echo is excluded.
    pub async fn broadcast(
        &self,
        message: ChatMessage,
        origin: Option<ConnectionId>,
    ) -> Result<(), RoomError> {
        self.commands
            .send(RoomCommand::Broadcast { message, origin })
            .await
            .map_err(|_| self.closed())
    }

    /// Current member connection ids, in no particular order
    pub async fn members(&self) -> Result<Vec<ConnectionId>, RoomError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(RoomCommand::Members { reply })
            .await
            .map_err(|_| self.closed())?;
        done.await.map_err(|_| self.closed())
    }

    /// Ask the actor to close every member queue and stop
    pub async fn shutdown(&self) {
        let _ = self.commands.send(RoomCommand::Shutdown).await;
    }
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("epoch", &self.epoch)
            .field("closed", &self.is_closed())
            .finish()
    }
}
