//! Transcriber worker.
//!
//! Materializes the source media locally (download for the recorded branch,
//! already on disk for stream segments), runs the ASR engine, persists the
//! transcript, and hands off to the analyst.

use std::path::PathBuf;

use uuid::Uuid;

use clippipe_broker::ANALYSE_QUEUE;
use clippipe_media::download_video;
use clippipe_models::{AnalysePayload, Envelope, Step, TranscribePayload, TranscribeSource};
use clippipe_state::ProgressStage;

use crate::artifacts::resolve_artifact;
use crate::asr::global_transcriber;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Consume the transcribe queue until the connection drops.
pub async fn run(ctx: &WorkerContext) -> WorkerResult<()> {
    let tag = format!("transcriber-{}", Uuid::new_v4());
    ctx.broker
        .consume(clippipe_broker::TRANSCRIBE_QUEUE, &tag, |envelope| {
            handle_transcribe(ctx, envelope)
        })
        .await?;
    Ok(())
}

/// Process one transcribe message.
pub async fn handle_transcribe(ctx: &WorkerContext, envelope: Envelope) -> WorkerResult<()> {
    let job_id = envelope.job_id.clone();
    let log = JobLogger::new(&job_id, "transcribe");

    let payload: TranscribePayload = envelope
        .parse_payload()
        .map_err(|e| WorkerError::malformed_payload(format!("transcribe payload: {e}")))?;

    // A payload naming neither a URL nor a segment file is poison.
    let source = payload.source().ok_or_else(|| {
        WorkerError::malformed_payload("transcribe payload carries neither url nor segment_path")
    })?;

    ctx.mark_processing(&job_id, Step::Transcribe.as_str()).await;
    let paths = ctx.paths(&job_id);
    tokio::fs::create_dir_all(paths.root()).await?;

    // Step 1/3: materialize the media locally.
    let media_path: PathBuf = match source {
        TranscribeSource::Url(url) => {
            log.start(&format!("downloading {url}"));
            ctx.waypoint(&job_id, ProgressStage::Transcribing, 5, "Baixando vídeo...")
                .await;
            let target = paths.temp_video();
            if let Err(e) = download_video(&url, &target).await {
                log.failure(&format!("download failed: {e}"));
                ctx.mark_failed(&job_id, "transcribe_failed", &e.to_string()).await;
                return Err(e.into());
            }
            target
        }
        TranscribeSource::LocalFile(path) => {
            log.start(&format!("transcribing segment {path}"));
            match resolve_artifact(path.as_ref(), &ctx.config.data_dir).await {
                Ok(found) => found,
                Err(e) => {
                    log.failure(&format!("segment file missing: {e}"));
                    ctx.mark_failed(&job_id, "transcribe_missing_input", &e.to_string())
                        .await;
                    return Err(e);
                }
            }
        }
    };

    // Step 2/3: run the ASR engine (lazy process-wide singleton).
    ctx.waypoint(&job_id, ProgressStage::Transcribing, 20, "Transcrevendo áudio...")
        .await;
    let transcript = match global_transcriber().transcribe(&media_path).await {
        Ok(transcript) => transcript,
        Err(e) => {
            log.failure(&format!("transcription failed: {e}"));
            ctx.mark_failed(&job_id, "transcribe_failed", &e.to_string()).await;
            return Err(e);
        }
    };

    log.progress(&format!(
        "transcribed {} chars in {} segments",
        transcript.text.chars().count(),
        transcript.segments.len()
    ));

    // Step 3/3: persist the transcript artifact.
    let transcription_path = paths.transcription();
    let serialized = serde_json::to_string_pretty(&transcript)?;
    if let Err(e) = tokio::fs::write(&transcription_path, serialized).await {
        log.failure(&format!("failed to persist transcript: {e}"));
        ctx.mark_failed(&job_id, "transcribe_failed", &e.to_string()).await;
        return Err(e.into());
    }

    let analyse_payload = AnalysePayload {
        transcription_path: transcription_path.to_string_lossy().to_string(),
        video_path: media_path.to_string_lossy().to_string(),
    };
    let next = Envelope::new(job_id.clone(), Step::Analyse, &analyse_payload)?;
    ctx.broker.publish(ANALYSE_QUEUE, &next).await?;

    ctx.mark_processing(&job_id, Step::Analyse.as_str()).await;
    ctx.waypoint(&job_id, ProgressStage::Transcribing, 33, "Transcrição concluída")
        .await;

    log.done("handed off to analysis");
    Ok(())
}
