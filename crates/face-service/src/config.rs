use anyhow::{bail, Context, Result};
use common::validation::DEFAULT_MAX_IMAGE_BYTES;
use std::env;

/// Which descriptor extractor implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    /// ONNX Runtime detector + embedder loaded from disk
    Onnx,
    /// Deterministic in-process mock, for tests and demos
    Mock,
}

#[derive(Debug, Clone)]
pub struct FaceServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Node ID for this face service instance
    pub node_id: String,

    /// Inclusive Euclidean-distance acceptance threshold
    pub match_threshold: f32,

    /// Embedding dimensionality the extractor must produce
    pub embedding_dim: usize,

    /// Upper bound on a decoded image payload. The transport-layer limit
    /// is derived from this; it is configuration, not a core invariant.
    pub max_image_bytes: usize,

    /// Extractor implementation to run
    pub extractor: ExtractorKind,

    /// Path to the face detection ONNX model file
    pub detection_model_path: String,

    /// Path to the face embedding ONNX model file
    pub embedding_model_path: String,

    /// Binary used to transcode HEIC/HEIF payloads
    pub ffmpeg_bin: String,
}

impl FaceServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("FACE_SERVICE_ADDR").unwrap_or_else(|_| "0.0.0.0:8087".to_string());

        let match_threshold = match env::var("MATCH_THRESHOLD") {
            Ok(raw) => raw
                .parse::<f32>()
                .context("Invalid MATCH_THRESHOLD (expected a float)")?,
            Err(_) => crate::matcher::DEFAULT_MATCH_THRESHOLD,
        };
        if !match_threshold.is_finite() || match_threshold <= 0.0 {
            bail!("MATCH_THRESHOLD must be a positive finite number, got {match_threshold}");
        }

        let embedding_dim = match env::var("EMBEDDING_DIM") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("Invalid EMBEDDING_DIM (expected an integer)")?,
            Err(_) => 128,
        };
        if embedding_dim == 0 {
            bail!("EMBEDDING_DIM must be non-zero");
        }

        let max_image_bytes = match env::var("MAX_IMAGE_BYTES") {
            Ok(raw) => raw
                .parse::<usize>()
                .context("Invalid MAX_IMAGE_BYTES (expected an integer)")?,
            Err(_) => DEFAULT_MAX_IMAGE_BYTES,
        };

        let extractor = match env::var("FACE_EXTRACTOR")
            .unwrap_or_else(|_| "onnx".to_string())
            .to_lowercase()
            .as_str()
        {
            "onnx" => ExtractorKind::Onnx,
            "mock" => ExtractorKind::Mock,
            other => bail!("Unknown FACE_EXTRACTOR '{other}' (expected 'onnx' or 'mock')"),
        };

        let detection_model_path = env::var("FACE_DETECTION_MODEL")
            .unwrap_or_else(|_| "models/face_detector.onnx".to_string());
        let embedding_model_path = env::var("FACE_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "models/face_embedding.onnx".to_string());

        let ffmpeg_bin = env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string());

        let node_id = env::var("NODE_ID").unwrap_or_else(|_| {
            format!(
                "face-service-{}",
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
            )
        });

        Ok(Self {
            bind_addr,
            node_id,
            match_threshold,
            embedding_dim,
            max_image_bytes,
            extractor,
            detection_model_path,
            embedding_model_path,
            ffmpeg_bin,
        })
    }
}
