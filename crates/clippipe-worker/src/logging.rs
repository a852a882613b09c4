//! Structured job logging utilities.

use tracing::{error, info, warn};

use clippipe_models::JobId;

/// Job logger with consistent structured fields.
///
/// Thin convenience over `tracing` so every stage logs job lifecycle events
/// with the same shape.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: String,
}

impl JobLogger {
    /// Create a logger for one job within one stage.
    pub fn new(job_id: &JobId, stage: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Log the start of the stage.
    pub fn start(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Stage started: {}", message);
    }

    /// Log a progress note.
    pub fn progress(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "{}", message);
    }

    /// Log a non-fatal warning.
    pub fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, stage = %self.stage, "{}", message);
    }

    /// Log a stage failure.
    pub fn failure(&self, message: &str) {
        error!(job_id = %self.job_id, stage = %self.stage, "Stage failed: {}", message);
    }

    /// Log stage completion.
    pub fn done(&self, message: &str) {
        info!(job_id = %self.job_id, stage = %self.stage, "Stage completed: {}", message);
    }
}
