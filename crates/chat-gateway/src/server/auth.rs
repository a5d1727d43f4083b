//! Caller identity extractor
//!
//! Reads an access token from the `Authorization: Bearer` header, or from the
//! `token` query parameter for browser WebSocket clients that cannot set
//! headers, and verifies it with the shared [`JwtService`](chat_common::JwtService).

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Query},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chat_common::AppError;
use chat_core::UserId;
use serde::Deserialize;

use super::response::ApiError;
use super::GatewayState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub UserId);

impl Identity {
    pub fn user_id(&self) -> &UserId {
        &self.0
    }
}

async fn bearer_token<S: Send + Sync>(parts: &mut Parts, state: &S) -> Option<String> {
    if let Ok(TypedHeader(Authorization(bearer))) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
    {
        return Some(bearer.token().to_string());
    }

    Query::<TokenQuery>::from_request_parts(parts, state)
        .await
        .ok()
        .and_then(|Query(query)| query.token)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    GatewayState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts, state)
            .await
            .ok_or(AppError::MissingAuth)?;

        let gateway = GatewayState::from_ref(state);
        let user_id = gateway
            .jwt_service()
            .verify_access_token(&token)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected access token");
                e
            })?;

        Ok(Identity(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::testing;
    use axum::{body::Body, http::Request, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(identity: Identity) -> String {
        identity.user_id().to_string()
    }

    fn app() -> (Router, GatewayState) {
        let state = testing::state();
        let router = Router::new()
            .route("/whoami", get(whoami))
            .with_state(state.clone());
        (router, state)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("MISSING_AUTH"));
    }

    #[tokio::test]
    async fn test_bearer_header() {
        let (app, state) = app();
        let token = state
            .jwt_service()
            .issue_access_token(&UserId::parse("u1").unwrap())
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/whoami")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "u1");
    }

    #[tokio::test]
    async fn test_query_token() {
        let (app, state) = app();
        let token = state
            .jwt_service()
            .issue_access_token(&UserId::parse("u2").unwrap())
            .unwrap();

        let response = app
            .oneshot(
                Request::get(format!("/whoami?token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "u2");
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/whoami?token=not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("INVALID_TOKEN"));
    }
}
