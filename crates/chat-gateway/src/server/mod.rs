//! Gateway server setup
//!
//! Provides the WebSocket and HTTP routes and server lifecycle.

mod auth;
mod handler;
mod history;
mod response;
mod state;

pub use auth::Identity;
pub use handler::{room_socket_handler, user_socket_handler};
pub use history::{get_room_messages, HistoryLimit};
pub use response::{ApiError, ApiResult};
pub use state::GatewayState;

#[cfg(test)]
pub(crate) use state::testing;

use axum::{routing::get, Router};
use chat_common::{AppConfig, AppError};
use chat_core::MessageStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/ws/user/:user_id", get(user_socket_handler))
        .route("/ws/:room_id", get(room_socket_handler))
        .route("/messages/room/:room_id", get(get_room_messages))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize the message store and create `GatewayState`
///
/// Uses PostgreSQL when a database is configured, otherwise an in-memory store.
/// Production refuses to start without a database.
pub async fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    let store: Arc<dyn MessageStore> = match &config.database {
        Some(database) => {
            tracing::info!("Connecting to PostgreSQL...");
            let pool = chat_db::create_pool(&chat_db::PoolSettings::from(database))
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            chat_db::run_migrations(&pool)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            tracing::info!("PostgreSQL connection established");
            Arc::new(chat_db::PgMessageStore::new(pool))
        }
        None if config.app.env.is_production() => {
            return Err(AppError::Config(
                "DATABASE_URL is required in production".to_string(),
            ));
        }
        None => {
            tracing::warn!("DATABASE_URL not set, messages are kept in memory only");
            Arc::new(chat_db::MemoryMessageStore::new())
        }
    };

    Ok(GatewayState::new(config, store))
}

/// Serve the gateway on an already bound listener until `shutdown` resolves
///
/// Rooms and notification connections are closed with `GoingAway` once the
/// shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AppError> {
    let app = create_app(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            state.shutdown().await;
        })
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))
}

/// Run the gateway server
pub async fn run_server(state: GatewayState, addr: SocketAddr) -> Result<(), AppError> {
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/ws/:room_id", addr);

    serve(listener, state, shutdown_signal()).await
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config
        .gateway
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid gateway address: {e}")))?;

    // Create gateway state
    let state = create_gateway_state(config).await?;

    // Run server
    run_server(state, addr).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
