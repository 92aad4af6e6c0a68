//! Wire contracts for the Faceport enrollment and identification API.
//!
//! This module defines the request/response shapes exchanged with the
//! face-service, and the failure taxonomy surfaced to callers.

use serde::{Deserialize, Serialize};

/// Label reported by the identify endpoint when no enrolled face matches.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Request to enroll a face under a caller-supplied label
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollFaceRequest {
    /// Identity label to store the embedding under
    pub label: String,

    /// Image payload (base64 encoded for JSON transport)
    pub image_data: String,
}

/// Response for face enrollment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollFaceResponse {
    /// Whether the enrollment succeeded
    pub success: bool,

    /// The label the embedding was stored under
    pub label: String,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request to identify a face against the enrolled set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyFaceRequest {
    /// Image payload (base64 encoded for JSON transport)
    pub image_data: String,
}

/// Response for face identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyFaceResponse {
    /// Whether the pipeline ran to completion
    pub success: bool,

    /// Matched label, or [`UNKNOWN_LABEL`] when nothing is within threshold
    pub label: String,

    /// Euclidean distance to the matched entry (absent for "unknown")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// Summary of one enrolled face (diagnostic listing; embeddings omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSummary {
    /// Identity label
    pub label: String,

    /// Enrollment timestamp (Unix timestamp in seconds)
    pub enrolled_at: u64,
}

/// Response for the enrolled-face listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceListResponse {
    /// Enrolled faces in enrollment order
    pub faces: Vec<FaceSummary>,

    /// Number of enrolled entries
    pub count: usize,
}

/// Failure taxonomy for the ingestion/matching pipeline.
///
/// Every kind except `InternalFailure` is caller-caused and maps to a 4xx
/// status; `InternalFailure` indicates a collaborator contract violation
/// and maps to a 5xx status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty/oversized payload or missing/empty label
    InvalidInput,

    /// No known image signature in the payload
    UnrecognizedFormat,

    /// HEIC/HEIF transcoding failed
    ConversionFailure,

    /// Bytes passed sniffing but could not be decoded
    DecodeFailure,

    /// Valid image, no usable face
    NoFaceDetected,

    /// Unexpected collaborator error
    InternalFailure,
}

impl FailureKind {
    /// Stable snake_case name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UnrecognizedFormat => "unrecognized_format",
            Self::ConversionFailure => "conversion_failure",
            Self::DecodeFailure => "decode_failure",
            Self::NoFaceDetected => "no_face_detected",
            Self::InternalFailure => "internal_failure",
        }
    }
}

/// Structured failure body returned for any pipeline error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    /// Human-readable reason
    pub error: String,

    /// Machine-readable failure kind
    pub kind: FailureKind,
}
