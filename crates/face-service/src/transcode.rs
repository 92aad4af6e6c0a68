//! HEIC/HEIF normalization via an external transcoder.
//!
//! The transcoder is a collaborator, not part of the core: it receives the
//! raw container bytes and returns equivalent bytes in a directly decodable
//! format (JPEG). A conversion failure is terminal for the request and is
//! never retried with different settings.

use crate::error::PipelineError;
use crate::sniff::ImageKind;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// External collaborator that converts a recognized-but-non-decodable
/// container into a directly decodable byte form.
#[async_trait]
pub trait ImageTranscoder: Send + Sync {
    /// Convert `bytes` of `kind` into JPEG bytes
    async fn transcode(&self, bytes: &[u8], kind: ImageKind) -> Result<Vec<u8>, PipelineError>;
}

/// Transcoder that pipes the payload through an `ffmpeg` subprocess.
pub struct FfmpegTranscoder {
    ffmpeg_bin: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

#[async_trait]
impl ImageTranscoder for FfmpegTranscoder {
    async fn transcode(&self, bytes: &[u8], kind: ImageKind) -> Result<Vec<u8>, PipelineError> {
        debug!(
            kind = kind.as_str(),
            size_bytes = bytes.len(),
            "transcoding payload to jpeg"
        );

        let mut child = Command::new(&self.ffmpeg_bin)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-i",
                "pipe:0",
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-c:v",
                "mjpeg",
                "-q:v",
                "2",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PipelineError::InternalFailure(format!(
                    "failed to spawn transcoder '{}': {}",
                    self.ffmpeg_bin, e
                ))
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            PipelineError::InternalFailure("transcoder stdin unavailable".to_string())
        })?;

        // Feed stdin while draining stdout so neither pipe can fill and stall
        let write = async {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await?;
            drop(stdin);
            Ok::<_, std::io::Error>(())
        };
        let (write_result, output) = tokio::join!(write, child.wait_with_output());

        let output = output.map_err(|e| {
            PipelineError::InternalFailure(format!("waiting for transcoder: {e}"))
        })?;

        // An early EPIPE means ffmpeg rejected the container before reading
        // it all; the exit status carries the real reason
        if let Err(e) = write_result {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                record_transcode(kind, "failure");
                return Err(PipelineError::ConversionFailure(format!(
                    "writing payload to transcoder: {e}"
                )));
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            record_transcode(kind, "failure");
            return Err(PipelineError::ConversionFailure(format!(
                "transcoder exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            record_transcode(kind, "failure");
            return Err(PipelineError::ConversionFailure(
                "transcoder returned no data".to_string(),
            ));
        }

        record_transcode(kind, "success");
        debug!(
            kind = kind.as_str(),
            output_bytes = output.stdout.len(),
            "transcode complete"
        );

        Ok(output.stdout)
    }
}

fn record_transcode(kind: ImageKind, status: &str) {
    telemetry::metrics::FACE_TRANSCODE_OPERATIONS
        .with_label_values(&[kind.as_str(), status])
        .inc();
}

/// In-process transcoder for tests and demos.
///
/// Treats the container as a thin wrapper: scans past the `ftyp` box for an
/// embedded JPEG or PNG payload and returns it verbatim, failing like the
/// real transcoder does on a container with no decodable payload inside.
pub struct UnwrapTranscoder;

#[async_trait]
impl ImageTranscoder for UnwrapTranscoder {
    async fn transcode(&self, bytes: &[u8], kind: ImageKind) -> Result<Vec<u8>, PipelineError> {
        for start in 0..bytes.len().saturating_sub(3) {
            let window = &bytes[start..];
            let is_jpeg = window[0] == 0xFF && window[1] == 0xD8 && window[2] == 0xFF;
            let is_png = window.len() >= 8 && window[..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
            if is_jpeg || is_png {
                record_transcode(kind, "success");
                return Ok(window.to_vec());
            }
        }

        record_transcode(kind, "failure");
        Err(PipelineError::ConversionFailure(format!(
            "no decodable payload in {} container",
            kind.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heic_wrapping(payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&20u32.to_be_bytes());
        bytes.extend_from_slice(b"ftypheic");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"mif1");
        bytes.extend_from_slice(payload);
        bytes
    }

    #[tokio::test]
    async fn test_unwrap_transcoder_extracts_jpeg() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        let wrapped = heic_wrapping(&jpeg);

        let out = UnwrapTranscoder
            .transcode(&wrapped, ImageKind::Heic)
            .await
            .unwrap();
        assert_eq!(out, jpeg);
    }

    #[tokio::test]
    async fn test_unwrap_transcoder_fails_on_opaque_container() {
        let wrapped = heic_wrapping(&[0x00, 0x01, 0x02, 0x03]);

        let err = UnwrapTranscoder
            .transcode(&wrapped, ImageKind::Heic)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConversionFailure(_)));
    }

    #[tokio::test]
    async fn test_ffmpeg_transcoder_missing_binary_is_internal() {
        let transcoder = FfmpegTranscoder::new("definitely-not-a-real-binary");
        let err = transcoder
            .transcode(&[0u8; 4], ImageKind::Heic)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InternalFailure(_)));
    }
}
