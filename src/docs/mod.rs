use utoipa::OpenApi;
use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::ready_check,
        handlers::rooms::room_members,
        handlers::diagnostics::diagnostics,
    ),
    components(
        schemas(HealthResponse, ErrorResponse, RoomMembersResponse, RoomMember, DiagnosticsResponse)
    ),
    tags(
        (name = "api", description = "API endpoints")
    )
)]
pub struct ApiDoc;
