use tracing::{debug, error};
use chrono::Utc;

use crate::models::{PongMessage, SendMessage};
use crate::ws::{router::send_direct, ConnectionId, Outbox};

/// Handle PingMessage - reply with a pong.
pub fn handle_ping_message(connection_id: ConnectionId, outbox: &Outbox) {
    debug!("Ping message received from {}", connection_id);

    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    if !send_direct(outbox, connection_id, &pong) {
        error!("Failed to send Pong message to {}", connection_id);
    }
}
