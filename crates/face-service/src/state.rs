use crate::config::FaceServiceConfig;
use crate::error::PipelineError;
use crate::extract::DescriptorExtractor;
use crate::matcher::{self, MatchResult};
use crate::sniff;
use crate::store::EmbeddingStore;
use crate::transcode::ImageTranscoder;
use common::faces::FaceSummary;
use common::validation::{validate_label, validate_payload_size};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct FaceServiceState {
    inner: Arc<FaceServiceStateInner>,
}

struct FaceServiceStateInner {
    node_id: String,
    match_threshold: f32,
    max_image_bytes: usize,
    store: EmbeddingStore,
    extractor: Arc<dyn DescriptorExtractor>,
    transcoder: Arc<dyn ImageTranscoder>,
}

impl FaceServiceState {
    pub fn new(
        config: &FaceServiceConfig,
        extractor: Arc<dyn DescriptorExtractor>,
        transcoder: Arc<dyn ImageTranscoder>,
    ) -> Self {
        Self {
            inner: Arc::new(FaceServiceStateInner {
                node_id: config.node_id.clone(),
                match_threshold: config.match_threshold,
                max_image_bytes: config.max_image_bytes,
                store: EmbeddingStore::new(extractor.embedding_dim()),
                extractor,
                transcoder,
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    /// Number of enrolled entries, for diagnostics and tests
    pub fn store_len(&self) -> usize {
        self.inner.store.len()
    }

    /// Transport-layer request bound: base64 plus JSON envelope overhead
    /// on top of the configured raw-image bound
    pub fn max_request_bytes(&self) -> usize {
        self.inner.max_image_bytes * 2
    }

    /// Enrolled faces in enrollment order (embeddings omitted)
    pub fn faces(&self) -> Vec<FaceSummary> {
        self.inner
            .store
            .snapshot()
            .into_iter()
            .map(|entry| FaceSummary {
                label: entry.label,
                enrolled_at: entry.enrolled_at,
            })
            .collect()
    }

    pub async fn extractor_healthy(&self) -> bool {
        self.inner.extractor.health_check().await
    }

    /// Run the full write-path pipeline and append the resulting embedding
    /// under `label`.
    pub async fn enroll(&self, label: &str, image: &[u8]) -> Result<(), PipelineError> {
        let result = self.enroll_inner(label, image).await;
        record_outcome("enroll", &result);
        result
    }

    async fn enroll_inner(&self, label: &str, image: &[u8]) -> Result<(), PipelineError> {
        validate_label(label).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        let embedding = self.ingest(image).await?;
        self.inner.store.enroll(label.to_string(), embedding)?;

        let store_size = self.inner.store.len();
        telemetry::metrics::FACE_STORE_ENTRIES.set(store_size as i64);
        info!(label = %label, store_size, "enrolled face");

        Ok(())
    }

    /// Run the full read-path pipeline and resolve the resulting embedding
    /// against the current store snapshot.
    pub async fn identify(&self, image: &[u8]) -> Result<MatchResult, PipelineError> {
        let result = self.identify_inner(image).await;
        record_outcome("identify", &result);
        result
    }

    async fn identify_inner(&self, image: &[u8]) -> Result<MatchResult, PipelineError> {
        let embedding = self.ingest(image).await?;

        let snapshot = self.inner.store.snapshot();
        let result = matcher::resolve(&snapshot, &embedding, self.inner.match_threshold);

        match &result {
            MatchResult::Identified { label, distance } => {
                telemetry::metrics::FACE_MATCH_RESULTS
                    .with_label_values(&["identified"])
                    .inc();
                info!(label = %label, distance, candidates = snapshot.len(), "identified face");
            }
            MatchResult::Unknown => {
                telemetry::metrics::FACE_MATCH_RESULTS
                    .with_label_values(&["unknown"])
                    .inc();
                info!(candidates = snapshot.len(), "no face within threshold");
            }
        }

        Ok(result)
    }

    /// Shared ingestion pipeline: validate -> sniff -> normalize -> extract.
    /// Every stage short-circuits with its terminal failure.
    async fn ingest(&self, image: &[u8]) -> Result<Vec<f32>, PipelineError> {
        validate_payload_size(image, self.inner.max_image_bytes)
            .map_err(|e| PipelineError::InvalidInput(e.to_string()))?;

        let kind = sniff::sniff(image).ok_or(PipelineError::UnrecognizedFormat)?;

        let decodable: Cow<'_, [u8]> = if kind.is_directly_decodable() {
            Cow::Borrowed(image)
        } else {
            let stage = Instant::now();
            let converted = self.inner.transcoder.transcode(image, kind).await?;
            telemetry::metrics::FACE_PIPELINE_STAGE_LATENCY
                .with_label_values(&["normalize"])
                .observe(stage.elapsed().as_secs_f64());
            Cow::Owned(converted)
        };

        let stage = Instant::now();
        let embedding = self.inner.extractor.extract(&decodable).await?;
        telemetry::metrics::FACE_PIPELINE_STAGE_LATENCY
            .with_label_values(&["extract"])
            .observe(stage.elapsed().as_secs_f64());

        Ok(embedding)
    }
}

fn record_outcome<T>(operation: &str, result: &Result<T, PipelineError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    telemetry::metrics::FACE_PIPELINE_REQUESTS
        .with_label_values(&[operation, outcome])
        .inc();

    match result {
        Err(e @ PipelineError::InternalFailure(_)) => {
            // Collaborator contract violation, not a bad upload
            tracing::error!(operation, error = %e, "pipeline run failed internally");
        }
        Err(e) => {
            warn!(operation, error = %e, "pipeline run rejected request");
        }
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorKind;
    use crate::extract::mock::MockExtractor;
    use crate::transcode::UnwrapTranscoder;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    fn test_config() -> FaceServiceConfig {
        FaceServiceConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            node_id: "test-node".to_string(),
            match_threshold: 0.6,
            embedding_dim: 128,
            max_image_bytes: 1024 * 1024,
            extractor: ExtractorKind::Mock,
            detection_model_path: String::new(),
            embedding_model_path: String::new(),
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }

    fn test_state() -> FaceServiceState {
        FaceServiceState::new(
            &test_config(),
            Arc::new(MockExtractor::new(128)),
            Arc::new(UnwrapTranscoder),
        )
    }

    fn png_bytes(color: [u8; 3]) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 8, Rgb(color));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_enroll_then_identify_round_trip() {
        let state = test_state();
        let payload = png_bytes([210, 90, 30]);

        state.enroll("alice", &payload).await.unwrap();
        assert_eq!(state.store_len(), 1);

        match state.identify(&payload).await.unwrap() {
            MatchResult::Identified { label, distance } => {
                assert_eq!(label, "alice");
                assert!(distance < 1e-6);
            }
            MatchResult::Unknown => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn test_identify_on_empty_store_is_unknown() {
        let state = test_state();
        let result = state.identify(&png_bytes([210, 90, 30])).await.unwrap();
        assert_eq!(result, MatchResult::Unknown);
    }

    #[tokio::test]
    async fn test_empty_payload_is_invalid_input() {
        let state = test_state();
        let err = state.enroll("alice", &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_label_is_invalid_input() {
        let state = test_state();
        let err = state.enroll("  ", &png_bytes([1, 2, 3])).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(state.store_len(), 0);
    }

    #[tokio::test]
    async fn test_non_image_is_unrecognized() {
        let state = test_state();
        let err = state.enroll("alice", b"plain text").await.unwrap_err();
        assert!(matches!(err, PipelineError::UnrecognizedFormat));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_invalid_input() {
        let mut config = test_config();
        config.max_image_bytes = 16;
        let state = FaceServiceState::new(
            &config,
            Arc::new(MockExtractor::new(128)),
            Arc::new(UnwrapTranscoder),
        );

        let err = state
            .identify(&png_bytes([210, 90, 30]))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
