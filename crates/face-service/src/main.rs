use anyhow::{Context, Result};
use face_service::{
    api,
    config::{ExtractorKind, FaceServiceConfig},
    extract::{mock::MockExtractor, onnx::{OnnxExtractor, OnnxExtractorConfig}, DescriptorExtractor},
    transcode::FfmpegTranscoder,
    FaceServiceState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize telemetry (logging and metrics)
    telemetry::init_with_service("face-service");

    info!("Starting Face Service...");

    // Load configuration from environment
    let config = FaceServiceConfig::from_env()?;
    info!(
        bind = %config.bind_addr,
        node_id = %config.node_id,
        threshold = config.match_threshold,
        embedding_dim = config.embedding_dim,
        "face service configuration"
    );

    // Model loading must finish before the listener binds; a failure here
    // is fatal to startup
    let extractor: Arc<dyn DescriptorExtractor> = match config.extractor {
        ExtractorKind::Onnx => {
            let extractor = OnnxExtractor::load(OnnxExtractorConfig::new(
                &config.detection_model_path,
                &config.embedding_model_path,
                config.embedding_dim,
            ))
            .context("failed to load face models")?;
            Arc::new(extractor)
        }
        ExtractorKind::Mock => {
            info!("running with the deterministic mock extractor");
            Arc::new(MockExtractor::new(config.embedding_dim))
        }
    };

    if extractor.embedding_dim() != config.embedding_dim {
        anyhow::bail!(
            "extractor produces {}-dim embeddings but EMBEDDING_DIM is {}",
            extractor.embedding_dim(),
            config.embedding_dim
        );
    }

    let transcoder = Arc::new(FfmpegTranscoder::new(config.ffmpeg_bin.clone()));

    // Create application state
    let state = FaceServiceState::new(&config, extractor, transcoder);

    // Build HTTP router
    let app = api::router(state.clone());

    // Bind and serve
    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Face Service listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
