pub mod api;

use std::sync::Arc;
use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{cors::{AllowOrigin, Any, CorsLayer}, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{docs::ApiDoc, state::AppState, websocket::handler::websocket_handler};
pub use api::create_api_routes;

/// Build the full application router: websocket endpoint, REST API and Swagger UI.
pub fn create_app(app: Arc<AppState>) -> Router {
    let cors = cors_layer(&app);

    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(app.clone())
        // Mount API routes
        .nest("/api", create_api_routes(app))
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(app: &AppState) -> CorsLayer {
    let Some(origins) = app.config.allowed_origins() else {
        if !app.config.is_development() {
            warn!("CORS_ORIGINS not set, allowing any origin");
        }
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    };

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
}
