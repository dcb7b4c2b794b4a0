use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ws::registry::Participant;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub room_id: String,
    #[serde(alias = "username")]
    pub display_name: String,
}

/// Code change as sent by a client. The room id is optional, the server
/// always stamps the connection's own room.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClientCodeChangeMessage {
    #[serde(default)]
    pub room_id: Option<String>,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SyncCodeMessage {
    #[serde(alias = "socketId")]
    pub target_connection_id: Uuid,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMessage {}

/// Any other client message type. It carries no meaning for the server and is
/// relayed to the room as is, stamped with the sender's room.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedMessage {
    pub kind: String,
    /// The whole frame, `type` included.
    pub payload: Map<String, Value>,
}

/// Types the server itself emits. A client may not impersonate them.
const SERVER_TYPES: [&str; 6] = ["joined", "sync-request", "disconnected", "sync-abandoned", "pong", "error"];

#[derive(Debug)]
pub enum FrameError {
    Malformed(serde_json::Error),
    MissingType,
    Reserved(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Malformed(e) => write!(f, "malformed frame: {}", e),
            FrameError::MissingType => write!(f, "frame has no type"),
            FrameError::Reserved(kind) => write!(f, "{} frames are sent by the server only", kind),
        }
    }
}

impl std::error::Error for FrameError {}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "code-change")]
    CodeChange(ClientCodeChangeMessage),
    #[serde(rename = "sync-code")]
    SyncCode(SyncCodeMessage),
    #[serde(rename = "ping")]
    Ping(PingMessage),
    #[serde(rename = "leave")]
    Leave(LeaveMessage),
    #[serde(skip)]
    Relay(RelayedMessage),
}

impl ReceivedMessage {
    /// Decode a client text frame. Known types are decoded strictly, unknown
    /// ones become [`ReceivedMessage::Relay`].
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text).map_err(FrameError::Malformed)?;
        let kind = match value.get("type").and_then(Value::as_str) {
            Some(kind) => kind.to_string(),
            None => return Err(FrameError::MissingType),
        };

        match kind.as_str() {
            "join" | "code-change" | "sync-code" | "ping" | "leave" => {
                serde_json::from_value(value).map_err(FrameError::Malformed)
            }
            reserved if SERVER_TYPES.contains(&reserved) => Err(FrameError::Reserved(kind)),
            _ => match value {
                Value::Object(payload) => Ok(ReceivedMessage::Relay(RelayedMessage { kind, payload })),
                _ => Err(FrameError::MissingType),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            ReceivedMessage::Join(_) => "join",
            ReceivedMessage::CodeChange(_) => "code-change",
            ReceivedMessage::SyncCode(_) => "sync-code",
            ReceivedMessage::Ping(_) => "ping",
            ReceivedMessage::Leave(_) => "leave",
            ReceivedMessage::Relay(relayed) => &relayed.kind,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberInfo {
    pub connection_id: Uuid,
    pub display_name: String,
}

impl From<&Participant> for MemberInfo {
    fn from(participant: &Participant) -> Self {
        Self {
            connection_id: participant.connection_id,
            display_name: participant.display_name.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMessage {
    pub members: Vec<MemberInfo>,
    pub joined_display_name: String,
    pub joined_connection_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestMessage {
    pub target_connection_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangeMessage {
    pub room_id: String,
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectedMessage {
    pub connection_id: Uuid,
    pub display_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAbandonReason {
    TimedOut,
    RelayDeparted,
    RelayUnreachable,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncAbandonedMessage {
    pub reason: SyncAbandonReason,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolErrorMessage {
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "joined")]
    Joined(JoinedMessage),
    #[serde(rename = "sync-request")]
    SyncRequest(SyncRequestMessage),
    #[serde(rename = "code-change")]
    CodeChange(CodeChangeMessage),
    #[serde(rename = "disconnected")]
    Disconnected(DisconnectedMessage),
    #[serde(rename = "sync-abandoned")]
    SyncAbandoned(SyncAbandonedMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
    #[serde(rename = "error")]
    Error(ProtocolErrorMessage),
}

impl SendMessage {
    pub fn error(message: impl Into<String>) -> Self {
        SendMessage::Error(ProtocolErrorMessage { message: message.into() })
    }
}
