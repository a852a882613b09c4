//! In-process pipeline runner.
//!
//! Processes one URL end to end with the synchronous DAG executor instead of
//! the broker topology. Intended for short recorded inputs and for exercising
//! the pipeline against fixtures.

use std::sync::Arc;

use tracing::{error, info};

use clippipe_models::JobId;
use clippipe_state::{NoopProgress, ProgressSink, StateProgress, StateStore};
use clippipe_worker::gemini::GeminiClient;
use clippipe_worker::{
    asr, init_process, run_pipeline, Analyst, Phase, PipelineContext, PipelineState, WorkerConfig,
};

#[tokio::main]
async fn main() {
    init_process("pipeline-runner");

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: pipeline-runner <url> [max_highlights] [--subtitles]");
        std::process::exit(1);
    };
    let mut max_highlights: usize = 5;
    let mut include_subtitles = false;
    for arg in args {
        if arg == "--subtitles" {
            include_subtitles = true;
        } else if let Ok(n) = arg.parse() {
            max_highlights = n;
        }
    }

    let config = WorkerConfig::from_env();

    let llm = match GeminiClient::from_env() {
        Ok(llm) => llm,
        Err(e) => {
            error!("LLM client unavailable: {e}");
            std::process::exit(1);
        }
    };

    let job_id = JobId::new();

    // Progress goes to the state store when one is reachable, otherwise the
    // run is silent (the executor never depends on the KV).
    let progress: Arc<dyn ProgressSink> = match StateStore::from_env() {
        Ok(store) => {
            let store = Arc::new(store);
            if let Err(e) = store.initialize(&job_id, &url).await {
                error!("State store unreachable, continuing without progress: {e}");
                Arc::new(NoopProgress)
            } else {
                Arc::new(StateProgress::new(store))
            }
        }
        Err(e) => {
            error!("State store misconfigured, continuing without progress: {e}");
            Arc::new(NoopProgress)
        }
    };

    let ctx = PipelineContext {
        analyst: Analyst::new(llm, config.chunking.clone()),
        transcriber: asr::global_transcriber(),
        progress,
        config,
    };

    let mut state = PipelineState::new(url, job_id).with_max_highlights(max_highlights);
    if include_subtitles {
        state = state.with_subtitles(Some("youtube".to_string()));
    }

    info!(job_id = %state.job_id, "Running in-process pipeline");
    let state = run_pipeline(&ctx, state).await;

    match state.phase {
        Phase::Done => {
            info!(
                job_id = %state.job_id,
                clips = state.clips_paths.len(),
                "Pipeline complete"
            );
            for clip in &state.clips_paths {
                println!("{}", clip.display());
            }
        }
        _ => {
            error!(
                job_id = %state.job_id,
                error = state.error.as_deref().unwrap_or("unknown"),
                "Pipeline failed"
            );
            std::process::exit(1);
        }
    }
}
