use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{FrameError, ReceivedMessage, SendMessage};
use crate::state::AppState;
use crate::ws::{router::send_direct, ConnectionId, Outbox, Participant};
use super::msg_code_change_handler::handle_code_change_message;
use super::msg_join_handler::handle_join_message;
use super::msg_leave_handler::handle_departure;
use super::msg_ping_handler::handle_ping_message;
use super::msg_relay_handler::handle_relayed_message;
use super::msg_sync_code_handler::handle_sync_code_message;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnState {
    /// Transport open, no room yet.
    Connected,
    Joined(Participant),
    /// Terminal.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Protocol state of one connection.
///
/// Dropping the handler closes it, so a connection task that ends for any
/// reason (error, abort, panic) still releases its room membership.
pub struct ConnectionHandler {
    connection_id: ConnectionId,
    outbox: Outbox,
    state: ConnState,
    app: Arc<AppState>,
}

impl ConnectionHandler {
    pub fn new(app: Arc<AppState>, connection_id: ConnectionId, outbox: Outbox) -> Self {
        Self {
            connection_id,
            outbox,
            state: ConnState::Connected,
            app,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn state(&self) -> &ConnState {
        &self.state
    }

    /// Decode and handle one text frame. Undecodable frames are skipped and
    /// the connection stays open.
    pub fn handle_frame(&mut self, text: &str) -> Flow {
        match ReceivedMessage::parse(text) {
            Ok(msg) => self.handle(msg),
            Err(FrameError::Malformed(e)) => {
                warn!("Failed to parse message from {}: {}", self.connection_id, e);
                Flow::Continue
            }
            Err(e) => {
                warn!("Refused frame from {}: {}", self.connection_id, e);
                send_direct(&self.outbox, self.connection_id, &SendMessage::error(e.to_string()));
                Flow::Continue
            }
        }
    }

    pub fn handle(&mut self, msg: ReceivedMessage) -> Flow {
        debug!("Connection {} received {}", self.connection_id, msg.kind());

        if self.state == ConnState::Closed {
            return Flow::Close;
        }

        match msg {
            ReceivedMessage::Ping(_) => handle_ping_message(self.connection_id, &self.outbox),
            ReceivedMessage::Leave(_) => {
                self.close();
                return Flow::Close;
            }
            ReceivedMessage::Join(join_msg) => {
                if let Some(participant) = handle_join_message(&self.app, self.connection_id, &self.outbox, join_msg) {
                    self.state = ConnState::Joined(participant);
                }
            }
            room_msg => self.handle_room_message(room_msg),
        }
        Flow::Continue
    }

    fn handle_room_message(&self, msg: ReceivedMessage) {
        match (&self.state, msg) {
            (ConnState::Joined(participant), ReceivedMessage::CodeChange(change_msg)) => {
                handle_code_change_message(&self.app, participant, change_msg);
            }
            (ConnState::Joined(participant), ReceivedMessage::SyncCode(sync_msg)) => {
                handle_sync_code_message(&self.app, participant, &self.outbox, sync_msg);
            }
            (ConnState::Joined(participant), ReceivedMessage::Relay(relayed)) => {
                handle_relayed_message(&self.app, participant, relayed);
            }
            (_, other) => {
                warn!("Connection {} sent {} before joining a room", self.connection_id, other.kind());
                send_direct(
                    &self.outbox,
                    self.connection_id,
                    &SendMessage::error(format!("join a room before sending {}", other.kind())),
                );
            }
        }
    }

    /// Move to CLOSED, releasing any room membership. Idempotent.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.state, ConnState::Closed) {
            ConnState::Joined(_) => handle_departure(&self.app, self.connection_id),
            ConnState::Connected => debug!("Connection {} closed before joining", self.connection_id),
            ConnState::Closed => {}
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.close();
    }
}
