//! Best-effort progress reporting.
//!
//! Both the broker workers and the in-process DAG executor report coarse
//! `{stage, percent, message}` waypoints through a `ProgressSink`. The sink is
//! strictly best-effort: a persistence failure is logged and never aborts the
//! work it describes.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use clippipe_models::JobId;

use crate::store::StateStore;

/// Coarse pipeline stages with their conventional percent bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// 0-33
    Transcribing,
    /// 33-66
    Analyzing,
    /// 66-100
    Editing,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Transcribing => "transcribing",
            ProgressStage::Analyzing => "analyzing",
            ProgressStage::Editing => "editing",
        }
    }

    /// The `[lo, hi]` percent band of this stage.
    pub fn band(&self) -> (u8, u8) {
        match self {
            ProgressStage::Transcribing => (0, 33),
            ProgressStage::Analyzing => (33, 66),
            ProgressStage::Editing => (66, 100),
        }
    }

    /// Map a 0.0-1.0 fraction of this stage into the global percent scale.
    pub fn scale(&self, fraction: f64) -> u8 {
        let (lo, hi) = self.band();
        let fraction = fraction.clamp(0.0, 1.0);
        (lo as f64 + fraction * (hi - lo) as f64).round() as u8
    }
}

/// Abstract progress reporter.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Record a waypoint for a job. Must never fail the caller.
    async fn update_progress(&self, job_id: &JobId, stage: ProgressStage, percent: u8, message: &str);
}

/// Progress sink that writes through the job state store.
pub struct StateProgress {
    store: Arc<StateStore>,
}

impl StateProgress {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProgressSink for StateProgress {
    async fn update_progress(&self, job_id: &JobId, stage: ProgressStage, percent: u8, message: &str) {
        let stage_name = stage.as_str().to_string();
        let message = message.to_string();
        let result = self
            .store
            .update(job_id, move |record| {
                record.set_progress(stage_name, percent, message);
            })
            .await;

        if let Err(e) = result {
            warn!(job_id = %job_id, error = %e, "Progress update failed (continuing)");
        }
    }
}

/// Progress sink that drops every waypoint. Used in tests and fire-and-forget
/// invocations.
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn update_progress(&self, _job_id: &JobId, _stage: ProgressStage, _percent: u8, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(ProgressStage::Transcribing.band(), (0, 33));
        assert_eq!(ProgressStage::Analyzing.band(), (33, 66));
        assert_eq!(ProgressStage::Editing.band(), (66, 100));
    }

    #[test]
    fn test_scale_maps_into_band() {
        assert_eq!(ProgressStage::Transcribing.scale(0.0), 0);
        assert_eq!(ProgressStage::Transcribing.scale(1.0), 33);
        assert_eq!(ProgressStage::Analyzing.scale(0.5), 50);
        assert_eq!(ProgressStage::Editing.scale(1.0), 100);
    }

    #[test]
    fn test_scale_clamps_fraction() {
        assert_eq!(ProgressStage::Analyzing.scale(-1.0), 33);
        assert_eq!(ProgressStage::Analyzing.scale(2.0), 66);
    }
}
