use crate::error::PipelineError;
use crate::matcher::MatchResult;
use crate::state::FaceServiceState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use base64::Engine;
use common::faces::{
    EnrollFaceRequest, EnrollFaceResponse, FaceListResponse, IdentifyFaceRequest,
    IdentifyFaceResponse, UNKNOWN_LABEL,
};
use serde_json::json;

/// Enroll a face under a caller-supplied label
pub async fn enroll_face(
    State(state): State<FaceServiceState>,
    Json(request): Json<EnrollFaceRequest>,
) -> impl IntoResponse {
    let image = match decode_image_payload(&request.image_data) {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    match state.enroll(&request.label, &image).await {
        Ok(()) => (
            StatusCode::OK,
            Json(EnrollFaceResponse {
                success: true,
                label: request.label,
                message: Some("face enrolled successfully".to_string()),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Resolve a face against the enrolled set
pub async fn identify_face(
    State(state): State<FaceServiceState>,
    Json(request): Json<IdentifyFaceRequest>,
) -> impl IntoResponse {
    let image = match decode_image_payload(&request.image_data) {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    match state.identify(&image).await {
        Ok(MatchResult::Identified { label, distance }) => (
            StatusCode::OK,
            Json(IdentifyFaceResponse {
                success: true,
                label,
                distance: Some(distance),
            }),
        )
            .into_response(),
        Ok(MatchResult::Unknown) => (
            StatusCode::OK,
            Json(IdentifyFaceResponse {
                success: true,
                label: UNKNOWN_LABEL.to_string(),
                distance: None,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// List all enrolled faces (diagnostic; embeddings are not exposed)
pub async fn list_faces(State(state): State<FaceServiceState>) -> impl IntoResponse {
    let faces = state.faces();
    let count = faces.len();
    (StatusCode::OK, Json(FaceListResponse { faces, count }))
}

/// Health check endpoint
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "face-service"
        })),
    )
}

/// Readiness check endpoint
pub async fn readyz(State(state): State<FaceServiceState>) -> impl IntoResponse {
    if state.extractor_healthy().await {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "enrolled": state.store_len()
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready"
            })),
        )
    }
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics() -> impl IntoResponse {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = telemetry::metrics::REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match String::from_utf8(buffer) {
        Ok(s) => s.into_response(),
        Err(e) => {
            tracing::error!("Failed to convert metrics to UTF-8: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to convert metrics",
            )
                .into_response()
        }
    }
}

fn decode_image_payload(image_data: &str) -> Result<Vec<u8>, PipelineError> {
    base64::prelude::BASE64_STANDARD
        .decode(image_data)
        .map_err(|e| PipelineError::InvalidInput(format!("invalid base64 image data: {e}")))
}
