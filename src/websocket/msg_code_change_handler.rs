use tracing::{debug, warn};

use crate::models::{ClientCodeChangeMessage, CodeChangeMessage, SendMessage};
use crate::state::AppState;
use crate::ws::Participant;

/// Handle a code change - stamp the sender's room and fan it out to everyone else.
pub fn handle_code_change_message(app: &AppState, sender: &Participant, change_msg: ClientCodeChangeMessage) {
    if let Some(claimed) = change_msg.room_id.as_deref() {
        if claimed != sender.room_id {
            warn!(
                "Connection {} sent a change for room {} while joined to {}, using {}",
                sender.connection_id, claimed, sender.room_id, sender.room_id
            );
        }
    }

    let change = SendMessage::CodeChange(CodeChangeMessage {
        room_id: sender.room_id.clone(),
        code: change_msg.code,
    });
    let delivery = app.router.broadcast(&sender.room_id, &change, Some(sender.connection_id));
    debug!(
        "Code change from {} relayed to {} peers in room {}",
        sender.connection_id, delivery.delivered, sender.room_id
    );
}
