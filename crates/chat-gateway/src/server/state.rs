//! Gateway state
//!
//! Application state for the gateway server.

use chat_common::{AppConfig, JwtService};
use chat_core::MessageStore;
use std::sync::Arc;

use crate::hub::Hub;
use crate::protocol::{CloseCode, ConnectionLimits};
use crate::registry::GlobalRegistry;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Directory of live rooms
    hub: Arc<Hub>,
    /// Notification connections by user
    registry: Arc<GlobalRegistry>,
    /// Durable message store
    store: Arc<dyn MessageStore>,
    /// Access token verification
    jwt_service: Arc<JwtService>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayState {
    /// Create a new gateway state
    pub fn new(config: AppConfig, store: Arc<dyn MessageStore>) -> Self {
        let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);
        Self {
            hub: Hub::new_shared(config.realtime.echo_policy),
            registry: Arc::new(GlobalRegistry::new()),
            store,
            jwt_service: Arc::new(jwt_service),
            config: Arc::new(config),
        }
    }

    /// Get the room directory
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the global registry
    pub fn registry(&self) -> &GlobalRegistry {
        &self.registry
    }

    /// Get a handle to the message store
    pub fn store(&self) -> Arc<dyn MessageStore> {
        Arc::clone(&self.store)
    }

    /// Get the JWT service
    pub fn jwt_service(&self) -> &JwtService {
        &self.jwt_service
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Per-connection limits derived from the realtime configuration
    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits::from(&self.config.realtime)
    }

    /// Close every room and notification connection
    pub async fn shutdown(&self) {
        self.hub.shutdown().await;
        let closed = self.registry.close_all(CloseCode::GoingAway);
        tracing::info!(notification_connections = closed, "Gateway state shut down");
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("hub", &self.hub)
            .field("registry", &self.registry)
            .field("config", &"AppConfig")
            .finish()
    }
}
