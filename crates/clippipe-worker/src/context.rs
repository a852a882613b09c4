//! Shared context for stage workers.

use std::sync::Arc;

use tracing::warn;

use clippipe_broker::{Broker, BrokerConfig};
use clippipe_models::{JobId, JobPaths, JobRecord};
use clippipe_state::{ProgressSink, ProgressStage, StateProgress, StateStore};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;

/// Everything a stage handler needs: configuration, the broker connection,
/// the advisory state store and the progress sink.
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub broker: Broker,
    pub state: Arc<StateStore>,
    pub progress: Arc<dyn ProgressSink>,
}

impl WorkerContext {
    /// Connect to the broker (declaring the topology) and the state store.
    pub async fn init() -> WorkerResult<Self> {
        let config = WorkerConfig::from_env();

        let broker = Broker::connect(&BrokerConfig::from_env()).await?;
        broker.declare_infrastructure().await?;

        let state = Arc::new(StateStore::from_env()?);
        let progress: Arc<dyn ProgressSink> = Arc::new(StateProgress::new(Arc::clone(&state)));

        Ok(Self {
            config,
            broker,
            state,
            progress,
        })
    }

    /// Artifact layout for a job.
    pub fn paths(&self, job_id: &JobId) -> JobPaths {
        JobPaths::new(&self.config.data_dir, job_id)
    }

    /// Best-effort state patch: store unavailability is logged, never fatal.
    pub async fn patch_state<F>(&self, job_id: &JobId, patch: F)
    where
        F: FnOnce(&mut JobRecord),
    {
        if let Err(e) = self.state.update(job_id, patch).await {
            warn!(job_id = %job_id, error = %e, "State update failed (continuing)");
        }
    }

    /// Best-effort job initialization in the state store.
    pub async fn init_state(&self, job_id: &JobId, url: &str) {
        if let Err(e) = self.state.initialize(job_id, url).await {
            warn!(job_id = %job_id, error = %e, "State initialization failed (continuing)");
        }
    }

    /// Mark a job PROCESSING at a step.
    pub async fn mark_processing(&self, job_id: &JobId, step: &str) {
        let step = step.to_string();
        self.patch_state(job_id, move |record| record.start_step(step))
            .await;
    }

    /// Mark a job FAILED at a terminal step, carrying the error message.
    pub async fn mark_failed(&self, job_id: &JobId, step: &str, error: &str) {
        let step = step.to_string();
        let error = error.to_string();
        self.patch_state(job_id, move |record| record.fail(step, error))
            .await;
    }

    /// Emit a progress waypoint.
    pub async fn waypoint(&self, job_id: &JobId, stage: ProgressStage, percent: u8, message: &str) {
        self.progress
            .update_progress(job_id, stage, percent, message)
            .await;
    }

    /// Fetch a job's record, tolerating store unavailability.
    pub async fn job_record(&self, job_id: &JobId) -> Option<JobRecord> {
        match self.state.get(job_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "State read failed (continuing without record)");
                None
            }
        }
    }
}
