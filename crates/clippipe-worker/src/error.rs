//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing artifact: {0}")]
    MissingArtifact(PathBuf),

    #[error("Transcription failed: {0}")]
    AsrFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("LLM request failed: {0}")]
    LlmFailed(String),

    #[error("LLM reply blocked ({reason})")]
    LlmBlocked { reason: String },

    #[error("LLM reply truncated at the output token limit")]
    LlmTruncated,

    #[error("LLM returned an empty reply")]
    LlmEmpty,

    #[error("LLM reply did not match the highlights schema: {0}")]
    LlmInvalidReply(String),

    #[error("Media error: {0}")]
    Media(#[from] clippipe_media::MediaError),

    #[error("Broker error: {0}")]
    Broker(#[from] clippipe_broker::BrokerError),

    #[error("State store error: {0}")]
    State(#[from] clippipe_state::StateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn malformed_payload(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn llm_failed(msg: impl Into<String>) -> Self {
        Self::LlmFailed(msg.into())
    }

    pub fn asr_failed(msg: impl Into<String>) -> Self {
        Self::AsrFailed(msg.into())
    }
}
