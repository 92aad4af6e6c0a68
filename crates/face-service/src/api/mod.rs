pub mod routes;

use crate::state::FaceServiceState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn router(state: FaceServiceState) -> Router {
    Router::new()
        // Health and metrics endpoints
        .route("/healthz", get(routes::healthz))
        .route("/readyz", get(routes::readyz))
        .route("/metrics", get(routes::metrics))
        // Enrollment and identification endpoints
        .route(
            "/v1/faces",
            get(routes::list_faces).post(routes::enroll_face),
        )
        .route("/v1/identify", post(routes::identify_face))
        .layer(DefaultBodyLimit::max(state.max_request_bytes()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
