use tracing::warn;

use crate::models::{SendMessage, SyncCodeMessage};
use crate::state::AppState;
use crate::ws::{router::send_direct, Outbox, Participant};

/// Handle SyncCodeMessage - a peer answering a sync request.
pub fn handle_sync_code_message(app: &AppState, sender: &Participant, outbox: &Outbox, sync_msg: SyncCodeMessage) {
    if let Err(rejected) = app.sync.relay_code(sender, sync_msg) {
        warn!("Sync code from {} not relayed: {}", sender.connection_id, rejected);
        send_direct(outbox, sender.connection_id, &SendMessage::error(rejected.to_string()));
    }
}
