//! Analyst worker.
//!
//! Loads the transcript, runs the LLM analysis (direct or chunked), persists
//! `highlights.json`, and hands off to the editor.

use uuid::Uuid;

use clippipe_broker::EDIT_QUEUE;
use clippipe_models::{
    AnalysePayload, EditPayload, Envelope, HighlightsData, Step, Transcript,
};
use clippipe_state::ProgressStage;

use crate::analyst::Analyst;
use crate::artifacts::resolve_artifact;
use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::gemini::GeminiClient;
use crate::logging::JobLogger;

/// Consume the analyse queue until the connection drops.
pub async fn run(ctx: &WorkerContext) -> WorkerResult<()> {
    let tag = format!("analyst-{}", Uuid::new_v4());
    ctx.broker
        .consume(clippipe_broker::ANALYSE_QUEUE, &tag, |envelope| {
            handle_analyse(ctx, envelope)
        })
        .await?;
    Ok(())
}

/// Process one analyse message.
pub async fn handle_analyse(ctx: &WorkerContext, envelope: Envelope) -> WorkerResult<()> {
    let job_id = envelope.job_id.clone();
    let log = JobLogger::new(&job_id, "analyse");

    let payload: AnalysePayload = envelope
        .parse_payload()
        .map_err(|e| WorkerError::malformed_payload(format!("analyse payload: {e}")))?;

    log.start(&format!("analysing {}", payload.transcription_path));

    ctx.mark_processing(&job_id, Step::Analyse.as_str()).await;
    ctx.waypoint(&job_id, ProgressStage::Analyzing, 40, "Analisando transcrição...")
        .await;

    // The transcript may still be settling on a shared mount, or live under a
    // different job tree for stream segments.
    let transcription_path = match resolve_artifact(
        payload.transcription_path.as_ref(),
        &ctx.config.data_dir,
    )
    .await
    {
        Ok(path) => path,
        Err(e) => {
            log.failure(&format!("transcription missing: {e}"));
            ctx.mark_failed(&job_id, "analyse_missing_transcription", &e.to_string())
                .await;
            return Err(e);
        }
    };

    let transcript: Transcript = match tokio::fs::read_to_string(&transcription_path).await {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(transcript) => transcript,
            Err(e) => {
                log.failure(&format!("unreadable transcript: {e}"));
                ctx.mark_failed(&job_id, "analyse_failed", &e.to_string()).await;
                return Err(e.into());
            }
        },
        Err(e) => {
            log.failure(&format!("failed to read transcript: {e}"));
            ctx.mark_failed(&job_id, "analyse_failed", &e.to_string()).await;
            return Err(e.into());
        }
    };

    let max_highlights = ctx
        .job_record(&job_id)
        .await
        .map(|record| record.max_highlights as usize)
        .unwrap_or(5);

    let llm = match GeminiClient::from_env() {
        Ok(llm) => llm,
        Err(e) => {
            log.failure(&format!("LLM client unavailable: {e}"));
            ctx.mark_failed(&job_id, "analyse_failed", &e.to_string()).await;
            return Err(e);
        }
    };
    let analyst = Analyst::new(llm, ctx.config.chunking.clone());

    // On any analysis failure no highlights.json is written: the editor only
    // ever sees a validated artifact.
    let highlights = match analyst.analyse(&transcript, max_highlights).await {
        Ok(highlights) => highlights,
        Err(e) => {
            log.failure(&format!("analysis failed: {e}"));
            ctx.mark_failed(&job_id, "analyse_failed", &e.to_string()).await;
            return Err(e);
        }
    };

    log.progress(&format!("{} highlights selected", highlights.len()));
    ctx.waypoint(
        &job_id,
        ProgressStage::Analyzing,
        50,
        &format!("Análise concluída - {} highlights encontrados", highlights.len()),
    )
    .await;

    let paths = ctx.paths(&job_id);
    let highlight_path = paths.highlights();
    if let Some(parent) = highlight_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let serialized = serde_json::to_string_pretty(&HighlightsData::new(highlights))?;
    if let Err(e) = tokio::fs::write(&highlight_path, serialized).await {
        log.failure(&format!("failed to persist highlights: {e}"));
        ctx.mark_failed(&job_id, "analyse_failed", &e.to_string()).await;
        return Err(e.into());
    }

    let edit_payload = EditPayload {
        highlight_path: highlight_path.to_string_lossy().to_string(),
        video_path: payload.video_path.clone(),
        transcription_path: Some(transcription_path.to_string_lossy().to_string()),
    };
    let next = Envelope::new(job_id.clone(), Step::Edit, &edit_payload)?;
    ctx.broker.publish(EDIT_QUEUE, &next).await?;

    ctx.mark_processing(&job_id, Step::Edit.as_str()).await;
    ctx.waypoint(&job_id, ProgressStage::Analyzing, 66, "Análise concluída")
        .await;

    log.done("handed off to editing");
    Ok(())
}
