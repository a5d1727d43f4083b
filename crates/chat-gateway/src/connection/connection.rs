//! Individual WebSocket connection
//!
//! Owns the read/write loop pair for one socket and tears the connection down
//! once either loop ends.

use axum::extract::ws::Message;
use chat_core::{RoomId, UserId};
use futures_util::{Sink, Stream};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::{read_loop, write_loop, ConnectionError, ConnectionId, OutboundQueue};
use crate::handlers;
use crate::protocol::{CloseCode, ConnectionLimits, Frame};
use crate::room::RoomHandle;
use crate::server::GatewayState;

/// What a connection is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionScope {
    /// Member of one room; inbound lines are chat messages
    Room(RoomId),
    /// The user's notification channel in the global registry
    User,
}

/// A single WebSocket connection
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    scope: ConnectionScope,
    queue: OutboundQueue,
}

impl Connection {
    /// Create a connection and the receiver for its write loop
    pub fn new(
        user_id: UserId,
        scope: ConnectionScope,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let id = ConnectionId::next();
        let (queue, frames) = OutboundQueue::channel(id, user_id.clone(), capacity);
        let connection = Arc::new(Self {
            id,
            user_id,
            scope,
            queue,
        });
        (connection, frames)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    /// Outbound queue shared with rooms and the registry
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Run a connection to completion
///
/// Attaches the connection to its room or to the global registry, drives the
/// read and write loops, and returns once teardown has finished. The returned
/// code is the reason the connection's queue was closed.
pub async fn serve_connection<Si, St, E>(
    sink: Si,
    stream: St,
    state: GatewayState,
    user_id: UserId,
    scope: ConnectionScope,
) -> CloseCode
where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: fmt::Display + Send,
    St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let limits = ConnectionLimits::from(&state.config().realtime);
    let (connection, frames) = Connection::new(user_id, scope, limits.queue_capacity);

    tracing::info!(
        connection_id = %connection.id(),
        user_id = %connection.user_id(),
        scope = ?connection.scope(),
        "WebSocket connection established"
    );

    let rooms = attach(&state, &connection).await;

    let mut writer = tokio::spawn(write_loop(
        sink,
        frames,
        connection.queue().clone(),
        limits,
    ));

    let reader_state = state.clone();
    let reader_connection = connection.clone();
    let mut reader = tokio::spawn(read_loop(stream, limits, move |line| {
        let state = reader_state.clone();
        let connection = reader_connection.clone();
        async move { handlers::dispatch_line(&state, &connection, line).await }
    }));

    tokio::select! {
        result = &mut reader => {
            let reason = result.unwrap_or_else(|e| ConnectionError::Socket(e.to_string()));
            log_end(&connection, &reason);

            // Record the reason before teardown so the Close frame carries it
            connection.queue().close(reason.close_code());
            detach(&state, &connection, &rooms).await;

            if timeout(limits.write_wait, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        result = &mut writer => {
            reader.abort();
            match result {
                Ok(Ok(())) => tracing::debug!(connection_id = %connection.id(), "Send task ended"),
                Ok(Err(e)) => log_end(&connection, &e),
                Err(e) => tracing::warn!(connection_id = %connection.id(), error = %e, "Send task failed"),
            }
            detach(&state, &connection, &rooms).await;
        }
    }

    let code = connection.queue().close_reason().unwrap_or(CloseCode::Normal);
    tracing::info!(
        connection_id = %connection.id(),
        user_id = %connection.user_id(),
        close_code = code.as_u16(),
        "WebSocket connection closed"
    );
    code
}

/// Join the connection's room or register it for notifications
async fn attach(state: &GatewayState, connection: &Arc<Connection>) -> Vec<RoomHandle> {
    match connection.scope() {
        ConnectionScope::Room(room_id) => {
            match state
                .hub()
                .join(room_id.clone(), connection.queue().clone())
                .await
            {
                Ok(room) => vec![room],
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        room_id = %room_id,
                        error = %e,
                        "Failed to join room"
                    );
                    connection.queue().close(CloseCode::GoingAway);
                    Vec::new()
                }
            }
        }
        ConnectionScope::User => {
            let displaced = state
                .registry()
                .register(connection.user_id().clone(), connection.queue().clone());
            if let Some(previous) = displaced {
                tracing::debug!(
                    user_id = %connection.user_id(),
                    previous = %previous.connection_id(),
                    "Replacing existing notification connection"
                );
                previous.close(CloseCode::GoingAway);
            }
            Vec::new()
        }
    }
}

/// Remove the connection from every room and from the registry
async fn detach(state: &GatewayState, connection: &Connection, rooms: &[RoomHandle]) {
    for room in rooms {
        room.unregister(connection.id()).await;
    }

    if *connection.scope() == ConnectionScope::User {
        state
            .registry()
            .unregister_connection(connection.user_id(), connection.id());
    }

    connection.queue().close(CloseCode::Normal);
}

fn log_end(connection: &Connection, reason: &ConnectionError) {
    if reason.is_clean() {
        tracing::debug!(connection_id = %connection.id(), "Client closed connection");
    } else {
        tracing::warn!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            error = %reason,
            "Connection ended"
        );
    }
}
