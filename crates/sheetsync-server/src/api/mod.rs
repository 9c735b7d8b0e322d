pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::bootstrap::AppServices;
use crate::{features, middleware};

/// Full application router with its middleware stack.
///
/// The intake routes are served both at the root, where existing clients
/// call them, and under `/api/v1`.
pub fn router(services: AppServices) -> Router {
    let cors = middleware::cors_layer(&services.config.cors);

    Router::new()
        .route("/health", get(health))
        .merge(features::conversions::conversions_routes())
        .nest(
            "/api/v1",
            features::router().route("/health", get(health)),
        )
        .with_state(services)
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(cors)
}

/// Readiness probe; ready when the task ledger answers
async fn health(State(services): State<AppServices>) -> Response {
    match services.ledger.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready" })),
            )
                .into_response()
        },
    }
}
