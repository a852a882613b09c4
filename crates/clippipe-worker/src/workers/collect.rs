//! Collector worker: stream fan-out.
//!
//! Captures a live stream into fixed-duration segments and publishes one
//! transcribe sub-job per segment. The parent job is left PROCESSING; the
//! finalizer aggregates child completions back into it.

use uuid::Uuid;

use clippipe_broker::TRANSCRIBE_QUEUE;
use clippipe_media::{collect_stream, MediaError};
use clippipe_models::{CollectPayload, Envelope, Step, TranscribePayload};

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Consume the collect queue until the connection drops.
pub async fn run(ctx: &WorkerContext) -> WorkerResult<()> {
    let tag = format!("collector-{}", Uuid::new_v4());
    ctx.broker
        .consume(clippipe_broker::COLLECT_QUEUE, &tag, |envelope| {
            handle_collect(ctx, envelope)
        })
        .await?;
    Ok(())
}

/// Process one collect message.
pub async fn handle_collect(ctx: &WorkerContext, envelope: Envelope) -> WorkerResult<()> {
    let job_id = envelope.job_id.clone();
    let log = JobLogger::new(&job_id, "collect");

    // Malformed payloads go straight to the DLQ without touching state.
    let payload: CollectPayload = envelope
        .parse_payload()
        .map_err(|e| WorkerError::malformed_payload(format!("collect payload: {e}")))?;
    let payload = payload.clamped();

    log.start(&format!(
        "capturing {} ({}s segments, {}s max)",
        payload.stream_url, payload.segment_duration, payload.max_duration
    ));

    ctx.mark_processing(&job_id, Step::Collect.as_str()).await;

    let paths = ctx.paths(&job_id);
    let outcome = match collect_stream(
        &payload.stream_url,
        paths.segments_dir(),
        payload.segment_duration,
        payload.max_duration,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(MediaError::NoSegments) => {
            log.failure("stream capture produced no segments");
            ctx.mark_failed(&job_id, "collect_no_segments", "no segments were produced")
                .await;
            return Err(MediaError::NoSegments.into());
        }
        Err(e) => {
            log.failure(&format!("stream capture failed: {e}"));
            ctx.mark_failed(&job_id, "collect_failed", &e.to_string()).await;
            return Err(e.into());
        }
    };

    let total = outcome.segment_count();
    log.progress(&format!("captured {total} segments, publishing sub-jobs"));

    // Fan out: one transcribe sub-job per produced segment, in deterministic
    // (sorted) order. A short capture publishes what exists.
    let mut published = 0u32;
    for (index, segment_path) in outcome.segment_paths.iter().enumerate() {
        let child_id = job_id.segment_child(index);
        let segment_path_str = segment_path.to_string_lossy().to_string();

        ctx.init_state(&child_id, &payload.stream_url).await;
        {
            let parent = job_id.clone();
            let seg_path = segment_path_str.clone();
            ctx.patch_state(&child_id, move |record| {
                record.current_step = Step::Transcribe.as_str().to_string();
                record.parent_job_id = Some(parent);
                record.segment_index = Some(index as u32);
                record.total_segments = Some(total as u32);
                record.segment_path = Some(seg_path);
            })
            .await;
        }

        let transcribe = Envelope::new(
            child_id.clone(),
            Step::Transcribe,
            &TranscribePayload::segment(
                segment_path_str,
                index as u32,
                total as u32,
                job_id.clone(),
            ),
        )?;
        ctx.broker.publish(TRANSCRIBE_QUEUE, &transcribe).await?;
        published += 1;

        log.progress(&format!(
            "segment {}/{} queued for transcription as {}",
            index + 1,
            total,
            child_id
        ));
    }

    ctx.patch_state(&job_id, move |record| {
        record.start_step(Step::Transcribe.as_str());
        record.segments_published = Some(published);
        record.segments_completed = Some(0);
    })
    .await;

    log.done(&format!("{published} sub-jobs published"));
    Ok(())
}
