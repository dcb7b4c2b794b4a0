use serde_json::Value;
use tracing::{debug, error};

use crate::models::RelayedMessage;
use crate::state::AppState;
use crate::ws::Participant;

/// Handle a message type the server does not interpret: stamp the sender's
/// room on it and pass it to everyone else in that room.
pub fn handle_relayed_message(app: &AppState, sender: &Participant, relayed: RelayedMessage) {
    let mut payload = relayed.payload;
    payload.insert("roomId".to_string(), Value::String(sender.room_id.clone()));

    let frame = match serde_json::to_string(&payload) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to encode {} from {}: {}", relayed.kind, sender.connection_id, e);
            return;
        }
    };
    let delivery = app.router.broadcast_frame(&sender.room_id, frame, Some(sender.connection_id));
    debug!(
        "{} from {} relayed to {} peers in room {}",
        relayed.kind, sender.connection_id, delivery.delivered, sender.room_id
    );
}
