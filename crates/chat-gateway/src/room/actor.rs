//! Room actor task

use chat_common::EchoPolicy;
use chat_core::{ChatMessage, RoomId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{RoomCommand, RoomHandle};
use crate::connection::{ConnectionId, EnqueueError, OutboundQueue};
use crate::protocol::{CloseCode, ServerFrame};

/// Capacity of a room's command channel
pub const ROOM_COMMAND_BUFFER: usize = 256;

/// Called once when the room stops
pub type IdleHook = Box<dyn FnOnce() + Send + 'static>;

struct RoomActor {
    room_id: RoomId,
    epoch: u64,
    echo_policy: EchoPolicy,
    members: HashMap<ConnectionId, OutboundQueue>,
    commands: mpsc::Receiver<RoomCommand>,
    on_stop: Option<IdleHook>,
}

/// Spawn a room actor
///
/// The room runs until it is shut down or its last member leaves. `on_stop`
/// runs before the actor stops accepting commands.
pub fn spawn_room(
    room_id: RoomId,
    epoch: u64,
    echo_policy: EchoPolicy,
    on_stop: IdleHook,
) -> (RoomHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(ROOM_COMMAND_BUFFER);
    let actor = RoomActor {
        room_id: room_id.clone(),
        epoch,
        echo_policy,
        members: HashMap::new(),
        commands: rx,
        on_stop: Some(on_stop),
    };
    let task = tokio::spawn(actor.run());
    (RoomHandle::new(room_id, epoch, tx), task)
}

impl RoomActor {
    async fn run(mut self) {
        tracing::debug!(room_id = %self.room_id, epoch = self.epoch, "Room started");

        while let Some(command) = self.commands.recv().await {
            let removed = match command {
                RoomCommand::Register { member, ack } => {
                    let connection_id = member.connection_id();
                    self.members.insert(connection_id, member);
                    let _ = ack.send(());
                    tracing::debug!(
                        room_id = %self.room_id,
                        connection_id = %connection_id,
                        members = self.members.len(),
                        "Member joined"
                    );
                    false
                }
                RoomCommand::Unregister { connection_id, ack } => {
                    let removed = self.remove(connection_id, CloseCode::Normal);
                    let _ = ack.send(removed);
                    removed
                }
                RoomCommand::Broadcast { message, origin } => self.broadcast(&message, origin),
                RoomCommand::Members { reply } => {
                    let _ = reply.send(self.members.keys().copied().collect());
                    false
                }
                RoomCommand::Shutdown => {
                    for member in self.members.values() {
                        member.close(CloseCode::GoingAway);
                    }
                    self.members.clear();
                    break;
                }
            };

            if removed && self.members.is_empty() {
                tracing::debug!(room_id = %self.room_id, "Last member left");
                break;
            }
        }

        self.stop().await;
    }

    fn remove(&mut self, connection_id: ConnectionId, reason: CloseCode) -> bool {
        match self.members.remove(&connection_id) {
            Some(member) => {
                member.close(reason);
                tracing::debug!(
                    room_id = %self.room_id,
                    connection_id = %connection_id,
                    members = self.members.len(),
                    "Member left"
                );
                true
            }
            None => false,
        }
    }

    /// Deliver to every member without waiting; returns whether anyone was evicted
    fn broadcast(&mut self, message: &ChatMessage, origin: Option<ConnectionId>) -> bool {
        let frame = match ServerFrame::message(message).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(room_id = %self.room_id, error = %e, "Failed to encode message");
                return false;
            }
        };

        let mut delivered = 0usize;
        let mut dead = Vec::new();
        for (&connection_id, member) in &self.members {
            if self.echo_policy == EchoPolicy::Exclude && origin == Some(connection_id) {
                continue;
            }
            match member.try_enqueue(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(EnqueueError::Full) => {
                    tracing::warn!(
                        room_id = %self.room_id,
                        connection_id = %connection_id,
                        user_id = %member.user_id(),
                        "Outbound queue full, evicting slow consumer"
                    );
                    member.close(CloseCode::SlowConsumer);
                    dead.push(connection_id);
                }
                Err(EnqueueError::Closed) => dead.push(connection_id),
            }
        }

        for connection_id in &dead {
            self.members.remove(connection_id);
        }

        tracing::trace!(
            room_id = %self.room_id,
            delivered,
            evicted = dead.len(),
            "Broadcast"
        );
        !dead.is_empty()
    }

    /// Leave the directory, refuse new commands and settle those already queued
    async fn stop(mut self) {
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }

        self.commands.close();
        while let Some(command) = self.commands.recv().await {
            match command {
                // Dropping the ack tells the caller to retry on a fresh room
                RoomCommand::Register { .. } | RoomCommand::Broadcast { .. } | RoomCommand::Shutdown => {}
                RoomCommand::Unregister { ack, .. } => {
                    let _ = ack.send(false);
                }
                RoomCommand::Members { reply } => {
                    let _ = reply.send(Vec::new());
                }
            }
        }

        tracing::debug!(room_id = %self.room_id, epoch = self.epoch, "Room stopped");
    }
}
