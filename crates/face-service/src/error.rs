use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::faces::{FailureKind, FailureResponse};
use thiserror::Error;

/// Terminal failure from any stage of the ingestion/matching pipeline.
///
/// Each stage returns its failure immediately; no stage retries or falls
/// back, and no failure is swallowed before reaching the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty/oversized payload or missing/empty label
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The payload matches no supported image signature
    #[error("payload does not match any supported image format")]
    UnrecognizedFormat,

    /// HEIC/HEIF transcoding failed
    #[error("format conversion failed: {0}")]
    ConversionFailure(String),

    /// Bytes passed sniffing but could not be decoded
    #[error("image decode failed: {0}")]
    DecodeFailure(String),

    /// Valid image, no usable face
    #[error("no face detected in image")]
    NoFaceDetected,

    /// Collaborator contract violation; should not occur in correct operation
    #[error("internal failure: {0}")]
    InternalFailure(String),
}

impl PipelineError {
    /// Machine-readable kind surfaced in the response body
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::UnrecognizedFormat => FailureKind::UnrecognizedFormat,
            Self::ConversionFailure(_) => FailureKind::ConversionFailure,
            Self::DecodeFailure(_) => FailureKind::DecodeFailure,
            Self::NoFaceDetected => FailureKind::NoFaceDetected,
            Self::InternalFailure(_) => FailureKind::InternalFailure,
        }
    }

    /// HTTP status: caller-caused kinds are 4xx, internal failures 500
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::UnrecognizedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::ConversionFailure(_) | Self::DecodeFailure(_) | Self::NoFaceDetected => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let body = Json(FailureResponse {
            error: self.to_string(),
            kind: self.kind(),
        });
        (self.status(), body).into_response()
    }
}
