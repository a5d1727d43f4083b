//! Room history endpoint

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    Json,
};
use chat_core::{RoomId, StoredMessage, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use serde::Deserialize;

use super::auth::Identity;
use super::response::{ApiError, ApiResult};
use super::GatewayState;

/// Raw history query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Validated history limit (1..=MAX_HISTORY_LIMIT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimit(pub i64);

impl Default for HistoryLimit {
    fn default() -> Self {
        Self(DEFAULT_HISTORY_LIMIT)
    }
}

impl From<HistoryParams> for HistoryLimit {
    fn from(params: HistoryParams) -> Self {
        Self(
            params
                .limit
                .unwrap_or(DEFAULT_HISTORY_LIMIT)
                .clamp(1, MAX_HISTORY_LIMIT),
        )
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for HistoryLimit
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<HistoryParams>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::invalid_query(e.to_string()))?;

        Ok(HistoryLimit::from(params))
    }
}

/// Recent messages of a room, oldest first
///
/// GET /messages/room/:room_id
pub async fn get_room_messages(
    State(state): State<GatewayState>,
    Path(room_id): Path<String>,
    identity: Identity,
    limit: HistoryLimit,
) -> ApiResult<Json<Vec<StoredMessage>>> {
    let room_id =
        RoomId::parse(room_id).map_err(|e| ApiError::invalid_path(format!("room_id: {e}")))?;

    let messages = state.store().list_by_room(&room_id, limit.0).await?;

    tracing::debug!(
        room_id = %room_id,
        user_id = %identity.user_id(),
        count = messages.len(),
        "History served"
    );
    Ok(Json(messages))
}
