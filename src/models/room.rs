use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ws::Participant;

/// Current membership of a room
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomMembersResponse {
    pub room_id: String,
    pub members: Vec<RoomMember>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub connection_id: uuid::Uuid,
    pub display_name: String,
}

impl From<Participant> for RoomMember {
    fn from(participant: Participant) -> Self {
        Self {
            connection_id: participant.connection_id,
            display_name: participant.display_name,
        }
    }
}
