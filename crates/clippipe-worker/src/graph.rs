//! Synchronous in-process pipeline executor.
//!
//! The same three stages as the broker topology — transcribe, analyse, edit —
//! composed as a linear DAG over a moved state record. Used to process one
//! recorded input end-to-end in a single process, without the broker. The
//! artifact paths are identical to the broker path, so both executors can be
//! exercised against the same fixtures.
//!
//! Error propagation is short-circuiting: the first node that fails populates
//! `state.error`, and every subsequent node observes it and skips its work.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use clippipe_media::{collect_stream, concat_segments, download_video};
use clippipe_models::{
    HighlightsData, JobId, JobPaths, SourceKind, SubtitleStyle, Transcript,
};
use clippipe_state::{ProgressSink, ProgressStage};

use crate::analyst::Analyst;
use crate::asr::SpeechTranscriber;
use crate::config::WorkerConfig;
use crate::editor::{edit_highlights, emit_first_clip_extras, EditOptions};
use crate::error::WorkerResult;

/// Stream capture parameters for the in-process path, which merges segments
/// instead of fanning out.
const INPROCESS_SEGMENT_DURATION: u64 = 60;
const INPROCESS_MAX_DURATION: u64 = 300;

/// Executor phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Transcribing,
    Analyzing,
    Editing,
    Done,
    Failed,
}

/// The state record moved through the DAG.
#[derive(Debug)]
pub struct PipelineState {
    pub job_id: JobId,
    pub url: String,
    pub max_highlights: usize,
    pub include_subtitles: bool,
    pub subtitle_style: Option<String>,
    pub phase: Phase,
    pub video_path: Option<PathBuf>,
    pub transcription_path: Option<PathBuf>,
    pub highlight_json_path: Option<PathBuf>,
    pub clips_paths: Vec<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl PipelineState {
    /// Fresh state for a URL.
    pub fn new(url: impl Into<String>, job_id: JobId) -> Self {
        Self {
            job_id,
            url: url.into(),
            max_highlights: 5,
            include_subtitles: false,
            subtitle_style: None,
            phase: Phase::Transcribing,
            video_path: None,
            transcription_path: None,
            highlight_json_path: None,
            clips_paths: Vec::new(),
            thumbnail_path: None,
            error: None,
        }
    }

    pub fn with_max_highlights(mut self, max_highlights: usize) -> Self {
        self.max_highlights = max_highlights.clamp(1, 20);
        self
    }

    pub fn with_subtitles(mut self, style: Option<String>) -> Self {
        self.include_subtitles = true;
        self.subtitle_style = style;
        self
    }

    /// Whether downstream nodes must skip their work.
    pub fn is_poisoned(&self) -> bool {
        self.error.is_some()
    }

    /// Record a node failure.
    fn note_failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(job_id = %self.job_id, "{message}");
        self.error = Some(message);
    }
}

/// Collaborators the executor drives.
pub struct PipelineContext {
    pub config: WorkerConfig,
    pub progress: Arc<dyn ProgressSink>,
    pub transcriber: Arc<dyn SpeechTranscriber>,
    pub analyst: Analyst,
}

impl PipelineContext {
    fn paths(&self, job_id: &JobId) -> JobPaths {
        JobPaths::new(&self.config.data_dir, job_id)
    }

    async fn waypoint(&self, state: &PipelineState, stage: ProgressStage, percent: u8, message: &str) {
        self.progress
            .update_progress(&state.job_id, stage, percent, message)
            .await;
    }
}

/// Run the three-node pipeline to completion.
pub async fn run_pipeline(ctx: &PipelineContext, mut state: PipelineState) -> PipelineState {
    state = node_transcribe(ctx, state).await;
    state = node_analyse(ctx, state).await;
    state = node_edit(ctx, state).await;

    if state.is_poisoned() {
        state.phase = Phase::Failed;
    } else {
        state.phase = Phase::Done;
        // Clips exist: the downloaded source is disposable. Transcript,
        // highlights and clips are retained until an explicit delete request.
        cleanup_temp_media(&ctx.paths(&state.job_id)).await;
        ctx.waypoint(&state, ProgressStage::Editing, 100, "Concluído!").await;
    }
    state
}

/// Remove the job's temporary source media.
async fn cleanup_temp_media(paths: &JobPaths) {
    if tokio::fs::remove_file(paths.temp_video()).await.is_ok() {
        info!(path = %paths.temp_video().display(), "Temporary source media removed");
    }
}

/// Node 1: materialize the media and produce the transcript.
async fn node_transcribe(ctx: &PipelineContext, mut state: PipelineState) -> PipelineState {
    if state.is_poisoned() {
        return state;
    }
    state.phase = Phase::Transcribing;
    info!(job_id = %state.job_id, url = %state.url, "[1/3] Transcribing");

    let paths = ctx.paths(&state.job_id);
    if let Err(e) = tokio::fs::create_dir_all(paths.root()).await {
        state.note_failure(format!("TranscribeError: cannot create job directory: {e}"));
        return state;
    }

    ctx.waypoint(&state, ProgressStage::Transcribing, 5, "Baixando vídeo...").await;

    let video_path = paths.temp_video();
    let materialized = match SourceKind::classify(&state.url) {
        // In-process streams are captured and merged rather than fanned out.
        SourceKind::Stream => capture_and_merge(&state.url, &paths, &video_path).await,
        SourceKind::Recorded => download_video(&state.url, &video_path)
            .await
            .map_err(Into::into),
    };
    if let Err(e) = materialized {
        state.note_failure(format!("TranscribeError: {e}"));
        return state;
    }

    ctx.waypoint(&state, ProgressStage::Transcribing, 20, "Transcrevendo áudio...").await;

    let transcript = match ctx.transcriber.transcribe(&video_path).await {
        Ok(transcript) => transcript,
        Err(e) => {
            state.note_failure(format!("TranscribeError: {e}"));
            return state;
        }
    };

    let transcription_path = paths.transcription();
    if let Err(e) = persist_json(&transcription_path, &transcript).await {
        state.note_failure(format!("TranscribeError: {e}"));
        return state;
    }

    state.video_path = Some(video_path);
    state.transcription_path = Some(transcription_path);

    ctx.waypoint(&state, ProgressStage::Transcribing, 33, "Transcrição concluída").await;
    state
}

/// Node 2: analyse the transcript into highlights.
async fn node_analyse(ctx: &PipelineContext, mut state: PipelineState) -> PipelineState {
    if state.is_poisoned() {
        return state;
    }
    state.phase = Phase::Analyzing;
    info!(job_id = %state.job_id, "[2/3] Analysing");

    ctx.waypoint(&state, ProgressStage::Analyzing, 40, "Analisando transcrição...").await;

    let Some(transcription_path) = state.transcription_path.clone() else {
        state.note_failure("AnalystError: transcription path missing from state");
        return state;
    };

    let transcript: Transcript = match tokio::fs::read_to_string(&transcription_path).await {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(transcript) => transcript,
            Err(e) => {
                state.note_failure(format!("AnalystError: unreadable transcript: {e}"));
                return state;
            }
        },
        Err(e) => {
            state.note_failure(format!("AnalystError: cannot read transcript: {e}"));
            return state;
        }
    };

    let highlights = match ctx.analyst.analyse(&transcript, state.max_highlights).await {
        Ok(highlights) => highlights,
        Err(e) => {
            state.note_failure(format!("AnalystError: {e}"));
            return state;
        }
    };

    info!(job_id = %state.job_id, count = highlights.len(), "Highlights selected");
    ctx.waypoint(
        &state,
        ProgressStage::Analyzing,
        50,
        &format!("Análise concluída - {} highlights encontrados", highlights.len()),
    )
    .await;

    let highlight_path = ctx.paths(&state.job_id).highlights();
    if let Err(e) = persist_json(&highlight_path, &HighlightsData::new(highlights)).await {
        state.note_failure(format!("AnalystError: {e}"));
        return state;
    }

    state.highlight_json_path = Some(highlight_path);

    ctx.waypoint(&state, ProgressStage::Analyzing, 66, "Análise concluída").await;
    state
}

/// Node 3: cut the clips.
async fn node_edit(ctx: &PipelineContext, mut state: PipelineState) -> PipelineState {
    if state.is_poisoned() {
        return state;
    }
    state.phase = Phase::Editing;
    info!(job_id = %state.job_id, "[3/3] Editing");

    ctx.waypoint(&state, ProgressStage::Editing, 70, "Cortando vídeo...").await;

    let (Some(video_path), Some(highlight_path)) =
        (state.video_path.clone(), state.highlight_json_path.clone())
    else {
        state.note_failure("EditorError: video or highlights missing from state");
        return state;
    };

    let highlights = match tokio::fs::read_to_string(&highlight_path).await {
        Ok(raw) => match serde_json::from_str::<HighlightsData>(&raw) {
            Ok(data) => data.highlights,
            Err(e) => {
                state.note_failure(format!("EditorError: unreadable highlights: {e}"));
                return state;
            }
        },
        Err(e) => {
            state.note_failure(format!("EditorError: cannot read highlights: {e}"));
            return state;
        }
    };

    let transcript: Option<Transcript> = match &state.transcription_path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok()),
        None => None,
    };

    let options = EditOptions {
        include_subtitles: state.include_subtitles,
        subtitle_style: state
            .subtitle_style
            .as_deref()
            .map(SubtitleStyle::from_name)
            .unwrap_or_default(),
        strict_timestamps: ctx.config.strict_edit_timestamps,
    };

    let clips_dir = ctx.paths(&state.job_id).clips_dir();
    let clips = match edit_highlights(
        &video_path,
        &highlights,
        &clips_dir,
        transcript.as_ref(),
        &options,
    )
    .await
    {
        Ok(clips) => clips,
        Err(e) => {
            state.note_failure(format!("EditorError: {e}"));
            return state;
        }
    };

    ctx.waypoint(
        &state,
        ProgressStage::Editing,
        95,
        &format!("Finalizando... {} clips gerados", clips.len()),
    )
    .await;

    state.thumbnail_path =
        emit_first_clip_extras(&video_path, transcript.as_ref(), &highlights, &clips).await;
    state.clips_paths = clips;
    state
}

/// Stream branch of the in-process executor: capture fixed-duration segments
/// and merge them into one local file.
async fn capture_and_merge(
    url: &str,
    paths: &JobPaths,
    video_path: &std::path::Path,
) -> WorkerResult<()> {
    let outcome = collect_stream(
        url,
        paths.segments_dir(),
        INPROCESS_SEGMENT_DURATION,
        INPROCESS_MAX_DURATION,
    )
    .await?;
    concat_segments(&outcome.segment_paths, video_path).await?;
    Ok(())
}

async fn persist_json<T: serde::Serialize>(
    path: &std::path::Path,
    value: &T,
) -> WorkerResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let serialized = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, serialized).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::gemini::GeminiClient;
    use clippipe_state::NoopProgress;

    struct FailingTranscriber;

    #[async_trait::async_trait]
    impl SpeechTranscriber for FailingTranscriber {
        async fn transcribe(
            &self,
            _media_path: &std::path::Path,
        ) -> WorkerResult<clippipe_models::Transcript> {
            Err(crate::error::WorkerError::asr_failed("engine unavailable"))
        }
    }

    fn test_context(data_dir: std::path::PathBuf) -> PipelineContext {
        PipelineContext {
            config: WorkerConfig {
                data_dir,
                ..Default::default()
            },
            progress: Arc::new(NoopProgress),
            transcriber: Arc::new(FailingTranscriber),
            analyst: Analyst::new(
                GeminiClient::new("test-key", "gemini-test", 256),
                ChunkingConfig::default(),
            ),
        }
    }

    #[test]
    fn test_state_defaults() {
        let state = PipelineState::new("https://example.com/v.mp4", JobId::from("j1"));
        assert_eq!(state.phase, Phase::Transcribing);
        assert_eq!(state.max_highlights, 5);
        assert!(!state.is_poisoned());
    }

    #[test]
    fn test_max_highlights_clamped() {
        let state = PipelineState::new("u", JobId::from("j")).with_max_highlights(99);
        assert_eq!(state.max_highlights, 20);
    }

    #[tokio::test]
    async fn test_poisoned_state_skips_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        let mut state = PipelineState::new("https://example.com/v.mp4", JobId::from("j1"));
        state.note_failure("TranscribeError: injected");

        // Downstream nodes must not clear the error or produce artifacts.
        let state = node_analyse(&ctx, state).await;
        assert!(state.is_poisoned());
        assert!(state.highlight_json_path.is_none());

        let state = node_edit(&ctx, state).await;
        assert!(state.is_poisoned());
        assert!(state.clips_paths.is_empty());
    }

    #[tokio::test]
    async fn test_failed_node_short_circuits_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        // The download fails (no yt-dlp in test environments, or nothing to
        // fetch at the URL), so the first node poisons the state and the
        // executor ends in Failed without touching analyse/edit.
        let state = PipelineState::new("https://example.com/missing.mp4", JobId::from("j2"));
        let state = run_pipeline(&ctx, state).await;

        assert_eq!(state.phase, Phase::Failed);
        assert!(state.error.as_deref().unwrap().starts_with("TranscribeError:"));
        assert!(state.highlight_json_path.is_none());
        assert!(state.clips_paths.is_empty());
    }

    #[tokio::test]
    async fn test_analyse_node_requires_transcription_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path().to_path_buf());

        let state = PipelineState::new("u", JobId::from("j3"));
        let state = node_analyse(&ctx, state).await;

        assert!(state.is_poisoned());
        assert!(state.error.as_deref().unwrap().contains("transcription path missing"));
    }
}
