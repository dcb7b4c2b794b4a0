use tracing::{info, warn};

use crate::models::{JoinMessage, SendMessage};
use crate::state::AppState;
use crate::ws::{router::send_direct, ConnectionId, Outbox, Participant};

/// Handle JoinMessage
///
/// Registers the connection and starts the state hand-off. The registry has
/// already queued the full membership to the whole room (joiner included) by
/// the time it returns. Returns the registered participant, or `None` when the
/// request was rejected.
pub fn handle_join_message(
    app: &AppState,
    connection_id: ConnectionId,
    outbox: &Outbox,
    join_msg: JoinMessage,
) -> Option<Participant> {
    let room_id = join_msg.room_id.trim();
    let display_name = join_msg.display_name.trim();
    if room_id.is_empty() || display_name.is_empty() {
        warn!("Rejected join from {}: room id and display name are required", connection_id);
        send_direct(outbox, connection_id, &SendMessage::error("roomId and displayName are required"));
        return None;
    }

    let (members, moved_from) = app.registry.join(room_id, connection_id, display_name, outbox.clone());
    if let Some(departure) = moved_from {
        info!("{} moved from room {} to {}", connection_id, departure.room_id, room_id);
        app.sync.on_departed(connection_id);
    }

    let me = members
        .iter()
        .find(|p| p.connection_id == connection_id)
        .cloned()?;
    info!("{} ({}) joined room {} with {} members", display_name, connection_id, room_id, members.len());

    app.sync.on_joined(&me, &members);
    Some(me)
}
