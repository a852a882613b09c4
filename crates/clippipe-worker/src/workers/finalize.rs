//! Finalizer worker: fan-in for stream sub-jobs.
//!
//! Consumes the terminal completed queue. For segment sub-jobs it counts the
//! completion against the parent's fan-out and marks the parent COMPLETED
//! once every published segment is accounted for. Messages for plain jobs
//! are informational and only logged.

use uuid::Uuid;

use clippipe_models::{Envelope, JobStatus};

use crate::context::WorkerContext;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Consume the completed queue until the connection drops.
pub async fn run(ctx: &WorkerContext) -> WorkerResult<()> {
    let tag = format!("finalizer-{}", Uuid::new_v4());
    ctx.broker
        .consume(clippipe_broker::COMPLETED_QUEUE, &tag, |envelope| {
            handle_completed(ctx, envelope)
        })
        .await?;
    Ok(())
}

/// Process one completed message.
pub async fn handle_completed(ctx: &WorkerContext, envelope: Envelope) -> WorkerResult<()> {
    let job_id = envelope.job_id.clone();
    let log = JobLogger::new(&job_id, "finalize");

    let Some(record) = ctx.job_record(&job_id).await else {
        log.progress("completed job has no advisory record, nothing to aggregate");
        return Ok(());
    };

    let Some(parent_id) = record.parent_job_id.clone() else {
        log.progress("job completed (not a fan-out child)");
        return Ok(());
    };

    log.progress(&format!("counting completion against parent {parent_id}"));

    // Read-modify-write on the parent is safe: this worker is the only
    // writer for parent aggregation, one delivery at a time.
    ctx.patch_state(&parent_id, |parent| {
        let completed = parent.segments_completed.unwrap_or(0) + 1;
        parent.segments_completed = Some(completed);

        let published = parent
            .segments_published
            .or(parent.total_segments)
            .unwrap_or(0);
        if published > 0 && completed >= published && parent.status != JobStatus::Failed {
            parent.status = JobStatus::Completed;
            parent.current_step = "completed".to_string();
            parent.progress_percent = 100;
            parent.progress_message = Some("Concluído!".to_string());
        }
    })
    .await;

    if let Some(parent) = ctx.job_record(&parent_id).await {
        if parent.status == JobStatus::Completed {
            log.done(&format!(
                "parent {} completed ({}/{} segments)",
                parent_id,
                parent.segments_completed.unwrap_or(0),
                parent.segments_published.unwrap_or(0)
            ));
        }
    }

    Ok(())
}
