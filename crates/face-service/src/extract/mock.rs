//! Deterministic mock extractor for tests and demonstration deployments.

use super::{l2_normalize, DescriptorExtractor};
use crate::error::PipelineError;
use async_trait::async_trait;
use image::imageops::FilterType;

/// Mock face descriptor extractor.
///
/// Derives the embedding from the image content itself (a downsampled RGB
/// strip, L2-normalized) so that identical payloads produce identical
/// embeddings and nearly identical payloads produce nearby ones. An
/// all-black image stands in for "no face in view"; undecodable bytes fail
/// like the real model does.
pub struct MockExtractor {
    dim: usize,
}

impl MockExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

#[async_trait]
impl DescriptorExtractor for MockExtractor {
    fn id(&self) -> &'static str {
        "mock_extractor"
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    async fn extract(&self, image: &[u8]) -> Result<Vec<f32>, PipelineError> {
        let start = std::time::Instant::now();

        let decoded = image::load_from_memory(image)
            .map_err(|e| PipelineError::DecodeFailure(e.to_string()))?;
        let rgb = decoded.to_rgb8();

        if rgb.pixels().all(|p| p.0 == [0, 0, 0]) {
            return Err(PipelineError::NoFaceDetected);
        }

        // One RGB triple per three embedding slots, sampled from a
        // fixed-width strip so the output shape never depends on input size
        let strip_width = (self.dim as u32).div_ceil(3).max(1);
        let strip = image::imageops::resize(&rgb, strip_width, 1, FilterType::Triangle);

        let mut embedding = vec![0.0f32; self.dim];
        for (i, value) in embedding.iter_mut().enumerate() {
            let pixel = strip.get_pixel((i as u32 / 3).min(strip_width - 1), 0);
            *value = pixel.0[i % 3] as f32 / 255.0;
        }
        l2_normalize(&mut embedding);

        telemetry::metrics::FACE_EXTRACTOR_INFERENCE_TIME
            .with_label_values(&[self.id()])
            .observe(start.elapsed().as_secs_f64());

        Ok(embedding)
    }
}
