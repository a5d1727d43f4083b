//! Inbound line handlers
//!
//! Routes each text line read from a socket according to the connection's scope.

mod chat;
mod error;

pub use chat::{spawn_persist, submit_line};
pub use error::{HandlerError, HandlerResult};

use crate::connection::{Connection, ConnectionScope};
use crate::server::GatewayState;

/// Handle one normalized inbound line
///
/// Errors are logged and never end the connection.
pub async fn dispatch_line(state: &GatewayState, connection: &Connection, line: String) {
    match connection.scope() {
        ConnectionScope::Room(_) => {
            if let Err(e) = submit_line(state, connection, line).await {
                tracing::debug!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Dropped inbound line"
                );
            }
        }
        ConnectionScope::User => {
            // The notification channel is receive-only
            tracing::trace!(
                connection_id = %connection.id(),
                "Ignoring text on notification connection"
            );
        }
    }
}
