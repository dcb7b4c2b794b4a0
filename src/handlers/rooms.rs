use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::debug;

use crate::models::{ErrorResponse, RoomMember, RoomMembersResponse};
use crate::state::AppState;

/// List the members of a room
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}/members",
    params(("room_id" = String, Path, description = "Room identifier")),
    responses(
        (status = 200, description = "Current room members", body = RoomMembersResponse),
        (status = 404, description = "Room has no members", body = ErrorResponse)
    )
)]
pub async fn room_members(
    State(app): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomMembersResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Membership requested for room {}", room_id);

    let members = app.registry.members_of(&room_id);
    if members.is_empty() {
        return Err(ErrorResponse::reply(StatusCode::NOT_FOUND, format!("Room {} does not exist", room_id)));
    }

    Ok(Json(RoomMembersResponse {
        room_id,
        members: members.into_iter().map(RoomMember::from).collect(),
    }))
}
