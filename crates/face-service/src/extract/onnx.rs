//! ONNX-backed descriptor extraction
//!
//! Two-stage: locate the single most confident face with the detection
//! model, then derive an L2-normalized embedding for it with the embedding
//! model. Model internals are opaque to the pipeline; this adapter only
//! enforces the one-embedding-or-terminal-failure contract.

use super::{l2_normalize, DescriptorExtractor};
use crate::error::PipelineError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxExtractorConfig {
    /// Path to the face detection ONNX model file
    pub detection_model_path: String,

    /// Path to the face embedding ONNX model file
    pub embedding_model_path: String,

    /// Confidence threshold below which a detection is not a face
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// Detection model input size (width and height)
    #[serde(default = "default_detection_input_size")]
    pub detection_input_size: u32,

    /// Embedding model input size (width and height)
    #[serde(default = "default_embedding_input_size")]
    pub embedding_input_size: u32,

    /// Expected embedding dimensionality
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Number of intra-operation threads per session
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

fn default_confidence() -> f32 {
    0.6
}

fn default_detection_input_size() -> u32 {
    640
}

fn default_embedding_input_size() -> u32 {
    112
}

fn default_embedding_dim() -> usize {
    128
}

fn default_intra_threads() -> usize {
    4
}

impl OnnxExtractorConfig {
    /// Config with default model tuning for the given paths and output size
    pub fn new(
        detection_model_path: impl Into<String>,
        embedding_model_path: impl Into<String>,
        embedding_dim: usize,
    ) -> Self {
        Self {
            detection_model_path: detection_model_path.into(),
            embedding_model_path: embedding_model_path.into(),
            confidence_threshold: default_confidence(),
            detection_input_size: default_detection_input_size(),
            embedding_input_size: default_embedding_input_size(),
            embedding_dim,
            intra_threads: default_intra_threads(),
        }
    }
}

/// Face region in original-image pixel coordinates
#[derive(Debug, Clone, Copy)]
struct FaceBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    confidence: f32,
}

impl FaceBox {
    fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// ONNX Runtime descriptor extractor
pub struct OnnxExtractor {
    config: OnnxExtractorConfig,
    detection_session: tokio::sync::Mutex<Session>,
    embedding_session: tokio::sync::Mutex<Session>,
}

impl OnnxExtractor {
    /// Load both models from disk. Called once at startup, before the
    /// service accepts requests; failure is fatal to the process.
    pub fn load(config: OnnxExtractorConfig) -> Result<Self> {
        let detection_session = Self::create_session(&config, &config.detection_model_path)?;
        info!(
            path = %config.detection_model_path,
            "initialized face detection model"
        );

        let embedding_session = Self::create_session(&config, &config.embedding_model_path)?;
        info!(
            path = %config.embedding_model_path,
            dim = config.embedding_dim,
            "initialized face embedding model"
        );

        Ok(Self {
            config,
            detection_session: tokio::sync::Mutex::new(detection_session),
            embedding_session: tokio::sync::Mutex::new(embedding_session),
        })
    }

    fn create_session(config: &OnnxExtractorConfig, model_path: &str) -> Result<Session> {
        Session::builder()
            .context("failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {model_path}"))
    }

    /// Convert to NCHW float input, normalized to [0, 1]
    fn preprocess_for_detection(&self, img: &DynamicImage) -> Array<f32, IxDyn> {
        let size = self.config.detection_input_size;
        let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
        let rgb_img = resized.to_rgb8();

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
            }
        }
        input
    }

    /// Convert a face crop to NCHW float input, normalized to [-1, 1]
    fn preprocess_for_embedding(&self, img: &DynamicImage) -> Array<f32, IxDyn> {
        let size = self.config.embedding_input_size;
        let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
        let rgb_img = resized.to_rgb8();

        let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
        for (x, y, pixel) in rgb_img.enumerate_pixels() {
            for channel in 0..3 {
                input[[0, channel, y as usize, x as usize]] =
                    (pixel[channel] as f32 / 127.5) - 1.0;
            }
        }
        input
    }

    /// Select the single face the model is most confident about.
    ///
    /// Output layout is [batch, 5, num_predictions]: center-x, center-y,
    /// width, height, confidence. Equal confidences fall back to the larger
    /// box.
    fn best_face(
        &self,
        output: &Array<f32, IxDyn>,
        original_width: u32,
        original_height: u32,
    ) -> Option<FaceBox> {
        let scale_x = original_width as f32 / self.config.detection_input_size as f32;
        let scale_y = original_height as f32 / self.config.detection_input_size as f32;

        let num_predictions = output.shape()[2];
        let mut best: Option<FaceBox> = None;

        for i in 0..num_predictions {
            let confidence = output[[0, 4, i]];
            if confidence < self.config.confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, i]];
            let cy = output[[0, 1, i]];
            let w = output[[0, 2, i]];
            let h = output[[0, 3, i]];

            let candidate = FaceBox {
                x: ((cx - w / 2.0) * scale_x).max(0.0) as u32,
                y: ((cy - h / 2.0) * scale_y).max(0.0) as u32,
                width: ((w * scale_x) as u32).min(original_width).max(1),
                height: ((h * scale_y) as u32).min(original_height).max(1),
                confidence,
            };

            let better = match best {
                None => true,
                Some(current) => {
                    candidate.confidence > current.confidence
                        || (candidate.confidence == current.confidence
                            && candidate.area() > current.area())
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        best
    }

    async fn run_detection(&self, img: &DynamicImage) -> Result<Option<FaceBox>, PipelineError> {
        let input_tensor = Value::from_array(self.preprocess_for_detection(img))
            .map_err(internal)?;

        let mut session = self.detection_session.lock().await;
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(internal)?;

        let output_value = outputs
            .get("output0")
            .or_else(|| outputs.get("output"))
            .or_else(|| outputs.get("boxes"))
            .ok_or_else(|| {
                PipelineError::InternalFailure("no detection output tensor found".to_string())
            })?;
        let (shape, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(internal)?;

        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())
            .map_err(internal)?;

        Ok(self.best_face(&output, img.width(), img.height()))
    }

    async fn run_embedding(&self, face_img: &DynamicImage) -> Result<Vec<f32>, PipelineError> {
        let input_tensor = Value::from_array(self.preprocess_for_embedding(face_img))
            .map_err(internal)?;

        let mut session = self.embedding_session.lock().await;
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(internal)?;

        let output_value = outputs
            .get("output")
            .or_else(|| outputs.get("output0"))
            .or_else(|| outputs.get("embedding"))
            .ok_or_else(|| {
                PipelineError::InternalFailure("no embedding output tensor found".to_string())
            })?;
        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(internal)?;

        let mut embedding: Vec<f32> = data.to_vec();
        if embedding.len() != self.config.embedding_dim {
            return Err(PipelineError::InternalFailure(format!(
                "embedding model returned {} values, expected {}",
                embedding.len(),
                self.config.embedding_dim
            )));
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

fn internal<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::InternalFailure(e.to_string())
}

#[async_trait]
impl DescriptorExtractor for OnnxExtractor {
    fn id(&self) -> &'static str {
        "onnx_extractor"
    }

    fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    async fn extract(&self, image: &[u8]) -> Result<Vec<f32>, PipelineError> {
        let start = std::time::Instant::now();

        let img = image::load_from_memory(image)
            .map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;

        let face = self
            .run_detection(&img)
            .await?
            .ok_or(PipelineError::NoFaceDetected)?;

        let face_img = img.crop_imm(face.x, face.y, face.width, face.height);
        let embedding = self.run_embedding(&face_img).await?;

        telemetry::metrics::FACE_EXTRACTOR_INFERENCE_TIME
            .with_label_values(&[self.id()])
            .observe(start.elapsed().as_secs_f64());

        Ok(embedding)
    }

    async fn health_check(&self) -> bool {
        // Sessions exist iff load() succeeded; nothing to probe at runtime
        true
    }
}
