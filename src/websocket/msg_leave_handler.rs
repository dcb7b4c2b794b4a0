use tracing::{debug, info};

use crate::state::AppState;
use crate::ws::ConnectionId;

/// Deregister a connection. The registry tells whoever is left in its room.
pub fn handle_departure(app: &AppState, connection_id: ConnectionId) {
    match app.registry.leave(connection_id) {
        Some(departure) => info!(
            "{} ({}) left room {}",
            departure.participant.display_name, connection_id, departure.room_id
        ),
        None => debug!("Connection {} closed without an active membership", connection_id),
    }
    app.sync.on_departed(connection_id);
}
