use std::sync::Arc;

use tracing::{debug, error};

use crate::models::SendMessage;
use super::outbox::Outbox;
use super::registry::{ConnectionId, SessionRegistry};

/// Per-call delivery tally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans protocol frames out to room members.
///
/// Delivery never waits on a recipient: a full or closed outbox only costs
/// that recipient its frame (and a full one gets its connection closed).
#[derive(Clone)]
pub struct BroadcastRouter {
    registry: Arc<SessionRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `message` to every member of `room_id` except `exclude`.
    pub fn broadcast(&self, room_id: &str, message: &SendMessage, exclude: Option<ConnectionId>) -> Delivery {
        match serde_json::to_string(message) {
            Ok(frame) => self.broadcast_frame(room_id, frame, exclude),
            Err(e) => {
                error!("Failed to serialize broadcast for room {}: {}", room_id, e);
                Delivery::default()
            }
        }
    }

    /// Same as [`broadcast`](Self::broadcast) for a frame that is already encoded.
    pub fn broadcast_frame(&self, room_id: &str, frame: String, exclude: Option<ConnectionId>) -> Delivery {
        let targets = self.registry.outboxes_of(room_id, exclude);
        if targets.is_empty() {
            debug!("Broadcast to room {} has no recipients", room_id);
            return Delivery::default();
        }

        let delivery = fan_out_frame(targets.iter().map(|(id, outbox)| (*id, outbox)), &frame);
        debug!(
            "Broadcast to room {}: delivered={}, failed={}",
            room_id, delivery.delivered, delivery.failed
        );
        delivery
    }

    /// Point-to-point delivery. Returns false when the connection is unknown or
    /// its outbox rejected the frame.
    pub fn send_to(&self, connection_id: ConnectionId, message: &SendMessage) -> bool {
        let Some((_, outbox)) = self.registry.outbox_of(connection_id) else {
            debug!("Direct send to unknown connection {} dropped", connection_id);
            return false;
        };
        send_direct(&outbox, connection_id, message)
    }
}

/// Serialize and queue a frame on a single outbox, registered or not.
pub fn send_direct(outbox: &Outbox, connection_id: ConnectionId, message: &SendMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(frame) => outbox.push(connection_id, frame),
        Err(e) => {
            error!("Failed to serialize message for connection {}: {}", connection_id, e);
            false
        }
    }
}

/// Serialize once and queue on every target. Never blocks, so it is safe to
/// call while the registry lock is held.
pub(crate) fn fan_out<'a>(
    targets: impl IntoIterator<Item = (ConnectionId, &'a Outbox)>,
    message: &SendMessage,
) -> Delivery {
    match serde_json::to_string(message) {
        Ok(frame) => fan_out_frame(targets, &frame),
        Err(e) => {
            error!("Failed to serialize room message: {}", e);
            Delivery::default()
        }
    }
}

fn fan_out_frame<'a>(targets: impl IntoIterator<Item = (ConnectionId, &'a Outbox)>, frame: &str) -> Delivery {
    let mut delivery = Delivery::default();
    for (connection_id, outbox) in targets {
        if outbox.push(connection_id, frame.to_string()) {
            delivery.delivered += 1;
        } else {
            delivery.failed += 1;
        }
    }
    delivery
}
