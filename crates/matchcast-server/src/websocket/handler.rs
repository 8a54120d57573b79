//! WebSocket message dispatch: parses incoming text as a [`ClientMessage`]
//! and applies it to the subscription registry.

use tracing::{debug, instrument, warn};

use super::connection::ClientConnection;
use super::registry::SubscriptionRegistry;
use crate::events::{ClientMessage, ServerMessage};

/// Reply sent for bytes that are not JSON.
pub const INVALID_JSON: &str = "Invalid JSON";

/// Handle an incoming WebSocket text message.
///
/// Returns the reply to enqueue for the sender, if any. Unparsable input gets
/// an error reply; well-formed JSON that is not a valid subscribe or
/// unsubscribe command is ignored.
#[instrument(skip_all, fields(conn_id = %connection.id))]
pub fn handle_message(
    message: &str,
    connection: &ClientConnection,
    registry: &SubscriptionRegistry,
) -> Option<ServerMessage<'static>> {
    let value: serde_json::Value = match serde_json::from_str(message) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "invalid JSON received");
            return Some(ServerMessage::Error {
                message: INVALID_JSON,
            });
        }
    };

    if !value.is_object() {
        debug!("ignoring non-object message");
        return None;
    }

    match serde_json::from_value::<ClientMessage>(value) {
        Ok(ClientMessage::Subscribe { match_id }) => {
            if registry.subscribe(match_id, connection) {
                debug!(%match_id, "subscribed");
            }
            Some(ServerMessage::Subscribed { match_id })
        }
        Ok(ClientMessage::Unsubscribe { match_id }) => {
            if registry.unsubscribe(match_id, connection) {
                debug!(%match_id, "unsubscribed");
            }
            Some(ServerMessage::Unsubscribed { match_id })
        }
        Ok(ClientMessage::Unknown) => {
            debug!("ignoring unknown message type");
            None
        }
        Err(e) => {
            debug!(error = %e, "ignoring malformed command");
            None
        }
    }
}

/// Handle a binary frame: valid UTF-8 is treated as text, anything else is
/// answered like unparsable input.
pub fn handle_binary(
    data: &[u8],
    connection: &ClientConnection,
    registry: &SubscriptionRegistry,
) -> Option<ServerMessage<'static>> {
    match std::str::from_utf8(data) {
        Ok(text) => handle_message(text, connection, registry),
        Err(_) => {
            debug!(conn_id = %connection.id, len = data.len(), "received non-UTF8 binary frame");
            Some(ServerMessage::Error {
                message: INVALID_JSON,
            })
        }
    }
}
