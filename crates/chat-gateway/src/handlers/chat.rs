//! Chat line submission
//!
//! Fan-out to the room happens first and never waits on the message store.

use chat_core::ChatMessage;
use tokio::task::JoinHandle;

use super::{HandlerError, HandlerResult};
use crate::connection::{Connection, ConnectionScope};
use crate::protocol::ServerFrame;
use crate::server::GatewayState;

/// Submit a chat line from a room connection
///
/// Routes the line to the connection's room, notifies other users through the
/// registry, and persists it in the background.
pub async fn submit_line(
    state: &GatewayState,
    connection: &Connection,
    line: String,
) -> HandlerResult<()> {
    let ConnectionScope::Room(room_id) = connection.scope() else {
        return Err(HandlerError::NoRoom);
    };

    let message = ChatMessage::new(room_id.clone(), connection.user_id().clone(), line);
    message.validate()?;

    tracing::trace!(
        connection_id = %connection.id(),
        room_id = %room_id,
        preview = message.preview(32),
        "Received line"
    );

    if !state
        .hub()
        .route(message.clone(), Some(connection.id()))
        .await
    {
        tracing::debug!(room_id = %room_id, "Room no longer live, line not fanned out");
    }

    if state.config().realtime.notify_global {
        let frame = ServerFrame::new_message(&message).to_frame()?;
        let notified = state
            .registry()
            .broadcast_to_all_except(&message.sender_id, &frame);
        tracing::trace!(room_id = %room_id, notified, "Notified users");
    }

    spawn_persist(state, connection, message);
    Ok(())
}

/// Append a message to the store on a detached task
///
/// A failure is logged and, if enabled, reported to the sender's queue.
pub fn spawn_persist(
    state: &GatewayState,
    connection: &Connection,
    message: ChatMessage,
) -> JoinHandle<()> {
    let store = state.store();
    let surface = state.config().realtime.surface_persistence_errors;
    let sender = connection.queue().clone();

    tokio::spawn(async move {
        match store.append(&message).await {
            Ok(stored) => {
                tracing::debug!(
                    message_id = %stored.id,
                    room_id = %stored.message.room_id,
                    "Message persisted"
                );
            }
            Err(e) => {
                tracing::warn!(
                    room_id = %message.room_id,
                    sender_id = %message.sender_id,
                    error = %e,
                    "Failed to persist message"
                );
                if surface {
                    match ServerFrame::persistence_failed(&message.room_id, &e).to_frame() {
                        Ok(frame) => {
                            let _ = sender.try_enqueue(frame);
                        }
                        Err(e) => tracing::error!(error = %e, "Failed to encode error frame"),
                    }
                }
            }
        }
    })
}
