pub mod mock;
pub mod onnx;

use crate::error::PipelineError;
use async_trait::async_trait;

/// Boundary to the external face model.
///
/// Implementations commit to exactly one embedding per image or a terminal
/// failure; partial results do not exist. Multi-face selection policy (the
/// single most confident face) is owned by the implementation.
#[async_trait]
pub trait DescriptorExtractor: Send + Sync {
    /// Identifier used in logs and metrics
    fn id(&self) -> &'static str;

    /// Output embedding dimensionality
    fn embedding_dim(&self) -> usize;

    /// Extract the descriptor for the single most confident face.
    ///
    /// Fails with `DecodeFailure` when the bytes cannot be decoded despite
    /// passing the sniffer, and `NoFaceDetected` when the decoded image has
    /// no usable face.
    async fn extract(&self, image: &[u8]) -> Result<Vec<f32>, PipelineError>;

    /// Health check - verify the extractor is operational
    async fn health_check(&self) -> bool {
        true
    }
}

/// L2-normalize an embedding in place; a zero vector is left untouched.
pub(crate) fn l2_normalize(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in embedding.iter_mut() {
            *value /= norm;
        }
    }
}
