//! WebSocket handlers
//!
//! Upgrade endpoints for room connections and per-user notification connections.

use axum::{
    extract::{ws::WebSocket, Path, State, WebSocketUpgrade},
    response::Response,
};
use chat_common::AppError;
use chat_core::{RoomId, UserId};
use futures_util::StreamExt;

use super::auth::Identity;
use super::response::{ApiError, ApiResult};
use super::GatewayState;
use crate::connection::{serve_connection, ConnectionScope};

/// Room WebSocket handler
///
/// GET /ws/:room_id
pub async fn room_socket_handler(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
    identity: Identity,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let room_id =
        RoomId::parse(room_id).map_err(|e| ApiError::invalid_path(format!("room_id: {e}")))?;

    Ok(upgrade(ws, state, identity.0, ConnectionScope::Room(room_id)))
}

/// Notification WebSocket handler
///
/// GET /ws/user/:user_id
pub async fn user_socket_handler(
    State(state): State<GatewayState>,
    Path(user_id): Path<String>,
    identity: Identity,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let user_id =
        UserId::parse(user_id).map_err(|e| ApiError::invalid_path(format!("user_id: {e}")))?;

    if &user_id != identity.user_id() {
        tracing::warn!(
            requested = %user_id,
            caller = %identity.user_id(),
            "Notification channel requested for another user"
        );
        return Err(AppError::InsufficientPermissions.into());
    }

    Ok(upgrade(ws, state, user_id, ConnectionScope::User))
}

fn upgrade(
    ws: WebSocketUpgrade,
    state: GatewayState,
    user_id: UserId,
    scope: ConnectionScope,
) -> Response {
    let limits = state.limits();
    // Frames between the two limits are closed with 4002 by the read loop
    let transport_cap = limits.max_frame_bytes.saturating_mul(4);

    ws.max_message_size(transport_cap)
        .max_frame_size(transport_cap)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(state, socket, user_id, scope))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(
    state: GatewayState,
    socket: WebSocket,
    user_id: UserId,
    scope: ConnectionScope,
) {
    let (sink, stream) = socket.split();
    serve_connection(sink, stream, state, user_id, scope).await;
}
