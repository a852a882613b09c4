//! Editor worker.
//!
//! Reads the highlights document (normalizing legacy shapes), cuts one clip
//! per highlight, emits advisory first-clip artifacts, and publishes the
//! terminal completed message.

use uuid::Uuid;

use clippipe_broker::COMPLETED_QUEUE;
use clippipe_models::{
    normalize_highlights, CompletedPayload, EditPayload, Envelope, Step, SubtitleStyle, Transcript,
};
use clippipe_state::ProgressStage;

use crate::artifacts::resolve_artifact;
use crate::context::WorkerContext;
use crate::editor::{edit_highlights, emit_first_clip_extras, EditOptions};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Consume the edit queue until the connection drops.
pub async fn run(ctx: &WorkerContext) -> WorkerResult<()> {
    let tag = format!("editor-{}", Uuid::new_v4());
    ctx.broker
        .consume(clippipe_broker::EDIT_QUEUE, &tag, |envelope| {
            handle_edit(ctx, envelope)
        })
        .await?;
    Ok(())
}

/// Process one edit message.
pub async fn handle_edit(ctx: &WorkerContext, envelope: Envelope) -> WorkerResult<()> {
    let job_id = envelope.job_id.clone();
    let log = JobLogger::new(&job_id, "edit");

    let payload: EditPayload = envelope
        .parse_payload()
        .map_err(|e| WorkerError::malformed_payload(format!("edit payload: {e}")))?;

    log.start(&format!("editing against {}", payload.highlight_path));

    ctx.mark_processing(&job_id, Step::Edit.as_str()).await;
    ctx.waypoint(&job_id, ProgressStage::Editing, 70, "Cortando vídeo...")
        .await;

    // The source video must exist before any cut is attempted.
    let video_path = match resolve_artifact(payload.video_path.as_ref(), &ctx.config.data_dir).await
    {
        Ok(path) => path,
        Err(e) => {
            log.failure(&format!("video missing: {e}"));
            ctx.mark_failed(&job_id, "edit_missing_input", &e.to_string()).await;
            return Err(e);
        }
    };

    let highlight_path = match resolve_artifact(
        payload.highlight_path.as_ref(),
        &ctx.config.data_dir,
    )
    .await
    {
        Ok(path) => path,
        Err(e) => {
            log.failure(&format!("highlights missing: {e}"));
            ctx.mark_failed(&job_id, "edit_missing_input", &e.to_string()).await;
            return Err(e);
        }
    };

    let highlights = match load_highlights(&highlight_path).await {
        Ok(highlights) => highlights,
        Err(e) => {
            log.failure(&format!("unreadable highlights: {e}"));
            ctx.mark_failed(&job_id, "edit_failed", &e.to_string()).await;
            return Err(e);
        }
    };

    // The transcript is optional; without it clips are cut bare.
    let transcript = match &payload.transcription_path {
        Some(path) => load_transcript(path).await,
        None => None,
    };

    let record = ctx.job_record(&job_id).await;
    let options = EditOptions {
        include_subtitles: record.as_ref().map(|r| r.include_subtitles).unwrap_or(false),
        subtitle_style: record
            .as_ref()
            .and_then(|r| r.subtitle_style.as_deref())
            .map(SubtitleStyle::from_name)
            .unwrap_or_default(),
        strict_timestamps: ctx.config.strict_edit_timestamps,
    };

    let clips = match edit_highlights(
        &video_path,
        &highlights,
        &ctx.paths(&job_id).clips_dir(),
        transcript.as_ref(),
        &options,
    )
    .await
    {
        Ok(clips) => clips,
        Err(e) => {
            log.failure(&format!("editing failed: {e}"));
            ctx.mark_failed(&job_id, "edit_failed", &e.to_string()).await;
            return Err(e);
        }
    };

    ctx.waypoint(
        &job_id,
        ProgressStage::Editing,
        95,
        &format!("Finalizando... {} clips gerados", clips.len()),
    )
    .await;

    // Advisory artifacts for the first clip; their failure never fails the job.
    let thumbnail =
        emit_first_clip_extras(&video_path, transcript.as_ref(), &highlights, &clips).await;

    let clips_paths: Vec<String> = clips
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    let completed_payload = CompletedPayload {
        final_video_path: clips_paths[0].clone(),
        original_video_path: video_path.to_string_lossy().to_string(),
        highlight_json_path: highlight_path.to_string_lossy().to_string(),
        clips_paths: clips_paths.clone(),
    };
    let next = Envelope::new(job_id.clone(), Step::Completed, &completed_payload)?;
    ctx.broker.publish(COMPLETED_QUEUE, &next).await?;

    let output_path = clips_paths[0].clone();
    let thumbnail_path = thumbnail.map(|p| p.to_string_lossy().to_string());
    ctx.patch_state(&job_id, move |r| {
        r.complete(output_path);
        r.thumbnail_path = thumbnail_path;
    })
    .await;

    log.done(&format!("{} clips emitted", clips_paths.len()));
    Ok(())
}

/// Read and normalize a highlights document (canonical, bare-list, or legacy
/// single-dict shape).
async fn load_highlights(
    path: &std::path::Path,
) -> WorkerResult<Vec<clippipe_models::Highlight>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    normalize_highlights(&value)
        .map_err(|e| WorkerError::job_failed(format!("highlights document: {e}")))
}

/// Best-effort transcript load; editing proceeds without subtitles on failure.
async fn load_transcript(path: &str) -> Option<Transcript> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(transcript) => Some(transcript),
        Err(e) => {
            tracing::warn!(path, error = %e, "Unreadable transcript, cutting without subtitles");
            None
        }
    }
}
