use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{DisconnectedMessage, JoinedMessage, MemberInfo, SendMessage};
use super::outbox::Outbox;
use super::router::fan_out;

pub type ConnectionId = Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub room_id: String,
}

#[derive(Clone, Debug)]
struct Member {
    participant: Participant,
    outbox: Outbox,
}

/// Result of a successful leave.
#[derive(Clone, Debug)]
pub struct Departure {
    pub room_id: String,
    pub participant: Participant,
    /// Members left in the room after the removal. Zero means the room is gone.
    pub remaining: usize,
}

#[derive(Default)]
struct RegistryState {
    /// Members in join order, so the last entry is the most recently joined.
    rooms: HashMap<String, Vec<Member>>,
    rooms_by_connection: HashMap<ConnectionId, String>,
}

impl RegistryState {
    fn remove(&mut self, connection_id: ConnectionId) -> Option<Departure> {
        let room_id = self.rooms_by_connection.remove(&connection_id)?;
        let members = self.rooms.get_mut(&room_id)?;
        let position = members
            .iter()
            .position(|m| m.participant.connection_id == connection_id)?;
        let removed = members.remove(position);
        let remaining = members.len();
        if remaining == 0 {
            self.rooms.remove(&room_id);
        }
        Some(Departure {
            room_id,
            participant: removed.participant,
            remaining,
        })
    }

    /// Queue `disconnected` to whoever is still in the departed room.
    fn announce_departure(&self, departure: &Departure) {
        let Some(members) = self.rooms.get(&departure.room_id) else {
            return;
        };
        let msg = SendMessage::Disconnected(DisconnectedMessage {
            connection_id: departure.participant.connection_id,
            display_name: departure.participant.display_name.clone(),
        });
        fan_out(members.iter().map(|m| (m.participant.connection_id, &m.outbox)), &msg);
    }
}

/// Authoritative room membership for the whole process.
///
/// Rooms are not stored entities: a room exists exactly while it has at least
/// one member. All mutations go through the one mutex and never await while
/// holding it. Membership frames (`joined`, `disconnected`) are queued before
/// the mutex is released, so every member sees changes in registry order.
#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds a participant, queues `joined` to the whole room (joiner included)
    /// and returns the room's membership in join order.
    ///
    /// Joining again with a known connection id replaces the previous entry,
    /// moving it to the target room if it differs. The returned departure, if
    /// any, describes the room that was left by such a move; that room has
    /// already been sent `disconnected`.
    pub fn join(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        display_name: &str,
        outbox: Outbox,
    ) -> (Vec<Participant>, Option<Departure>) {
        let mut state = self.state();

        let previous = state.remove(connection_id);
        let moved_from = previous.filter(|departure| departure.room_id != room_id);
        if let Some(departure) = &moved_from {
            state.announce_departure(departure);
        }

        let participant = Participant {
            connection_id,
            display_name: display_name.to_string(),
            room_id: room_id.to_string(),
        };
        state
            .rooms_by_connection
            .insert(connection_id, room_id.to_string());
        let members = state.rooms.entry(room_id.to_string()).or_default();
        members.push(Member { participant, outbox });

        let snapshot: Vec<Participant> = members.iter().map(|m| m.participant.clone()).collect();
        let joined = SendMessage::Joined(JoinedMessage {
            members: snapshot.iter().map(MemberInfo::from).collect(),
            joined_display_name: display_name.to_string(),
            joined_connection_id: connection_id,
        });
        fan_out(members.iter().map(|m| (m.participant.connection_id, &m.outbox)), &joined);

        debug!(
            "Connection {} joined room {} ({} members)",
            connection_id,
            room_id,
            snapshot.len()
        );
        (snapshot, moved_from)
    }

    /// Removes the connection from whichever room holds it and queues
    /// `disconnected` to the members left behind. Unknown ids are a no-op.
    pub fn leave(&self, connection_id: ConnectionId) -> Option<Departure> {
        let departure = {
            let mut state = self.state();
            let departure = state.remove(connection_id);
            if let Some(d) = &departure {
                state.announce_departure(d);
            }
            departure
        };
        match &departure {
            Some(d) if d.remaining == 0 => {
                info!("Room {} is empty and has been released", d.room_id);
            }
            Some(d) => {
                debug!("Connection {} left room {}", connection_id, d.room_id);
            }
            None => {
                debug!("Leave for unknown connection {} ignored", connection_id);
            }
        }
        departure
    }

    /// Membership snapshot in join order. Empty for unknown rooms.
    pub fn members_of(&self, room_id: &str) -> Vec<Participant> {
        self.state()
            .rooms
            .get(room_id)
            .map(|members| members.iter().map(|m| m.participant.clone()).collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.state().rooms_by_connection.get(&connection_id).cloned()
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.state().rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.state().rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.state().rooms_by_connection.len()
    }

    /// Delivery targets for a room, minus the excluded connection.
    pub(crate) fn outboxes_of(
        &self,
        room_id: &str,
        exclude: Option<ConnectionId>,
    ) -> Vec<(ConnectionId, Outbox)> {
        self.state()
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| Some(m.participant.connection_id) != exclude)
                    .map(|m| (m.participant.connection_id, m.outbox.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn outbox_of(&self, connection_id: ConnectionId) -> Option<(Participant, Outbox)> {
        let state = self.state();
        let room_id = state.rooms_by_connection.get(&connection_id)?;
        state
            .rooms
            .get(room_id)?
            .iter()
            .find(|m| m.participant.connection_id == connection_id)
            .map(|m| (m.participant.clone(), m.outbox.clone()))
    }
}
