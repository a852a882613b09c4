//! Speech recognition seam.
//!
//! The concrete ASR engine is a pluggable collaborator. The shipped
//! implementation shells out to a Whisper-compatible CLI that writes a
//! transcript JSON next to the media file. The engine handle is a lazy
//! process-wide singleton: several worker binaries share this crate but only
//! the transcriber needs the engine resident.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use clippipe_models::Transcript;

use crate::error::{WorkerError, WorkerResult};

/// Abstract speech-to-text engine.
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Transcribe a local media file into a timestamped transcript.
    async fn transcribe(&self, media_path: &Path) -> WorkerResult<Transcript>;
}

/// Whisper-compatible CLI transcriber.
///
/// Invokes `<binary> <file> --model <size> --output_format json --output_dir
/// <dir>` and reads back `<stem>.json`.
pub struct WhisperCli {
    binary: String,
    model_size: String,
}

impl WhisperCli {
    pub fn new(model_size: impl Into<String>) -> Self {
        Self {
            binary: std::env::var("WHISPER_BIN").unwrap_or_else(|_| "whisper".to_string()),
            model_size: model_size.into(),
        }
    }
}

impl Default for WhisperCli {
    fn default() -> Self {
        Self::new(std::env::var("WHISPER_MODEL").unwrap_or_else(|_| "base".to_string()))
    }
}

#[async_trait]
impl SpeechTranscriber for WhisperCli {
    async fn transcribe(&self, media_path: &Path) -> WorkerResult<Transcript> {
        if !media_path.exists() {
            return Err(WorkerError::MissingArtifact(media_path.to_path_buf()));
        }

        let output_dir = media_path
            .parent()
            .ok_or_else(|| WorkerError::asr_failed("media path has no parent directory"))?;

        info!(
            media = %media_path.display(),
            model = %self.model_size,
            "Transcribing with {}",
            self.binary
        );

        let output = Command::new(&self.binary)
            .arg(media_path)
            .args(["--model", &self.model_size])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| WorkerError::asr_failed(format!("failed to run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::asr_failed(format!(
                "{} exited with {:?}: {}",
                self.binary,
                output.status.code(),
                stderr.lines().last().unwrap_or("no output")
            )));
        }

        let stem = media_path
            .file_stem()
            .ok_or_else(|| WorkerError::asr_failed("media path has no file stem"))?;
        let transcript_path = output_dir.join(stem).with_extension("json");

        debug!(path = %transcript_path.display(), "Reading engine transcript");
        let raw = tokio::fs::read_to_string(&transcript_path).await.map_err(|e| {
            WorkerError::asr_failed(format!(
                "engine wrote no transcript at {}: {e}",
                transcript_path.display()
            ))
        })?;

        let mut transcript: Transcript = serde_json::from_str(&raw)
            .map_err(|e| WorkerError::asr_failed(format!("unreadable engine transcript: {e}")))?;

        if transcript.duration <= 0.0 {
            transcript.duration = transcript.effective_duration();
        }

        if transcript.text.trim().is_empty() && transcript.segments.is_empty() {
            return Err(WorkerError::asr_failed("engine returned an empty transcript"));
        }

        // The engine's sidecar file is superseded by the job-level artifact
        // the transcriber persists.
        tokio::fs::remove_file(&transcript_path).await.ok();

        Ok(transcript)
    }
}

static GLOBAL_TRANSCRIBER: OnceLock<Arc<dyn SpeechTranscriber>> = OnceLock::new();

/// The process-wide ASR engine, created on first use.
pub fn global_transcriber() -> Arc<dyn SpeechTranscriber> {
    GLOBAL_TRANSCRIBER
        .get_or_init(|| Arc::new(WhisperCli::default()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_media_is_reported() {
        let engine = WhisperCli::new("base");
        let err = engine
            .transcribe(Path::new("/nonexistent/video.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::MissingArtifact(_)));
    }

    #[test]
    fn test_global_transcriber_is_singleton() {
        let a = global_transcriber();
        let b = global_transcriber();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
