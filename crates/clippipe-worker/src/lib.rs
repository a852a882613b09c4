#![deny(unreachable_patterns)]
//! Pipeline stage workers.
//!
//! This crate provides:
//! - The broker-driven stage handlers (collect, transcribe, analyse, edit,
//!   finalize) and their binaries
//! - The chunked map-reduce transcript analyst
//! - The Gemini LLM wrapper and the ASR seam
//! - The synchronous in-process DAG executor
//! - Worker configuration, logging and error types

pub mod analyst;
pub mod artifacts;
pub mod asr;
pub mod chunking;
pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod gemini;
pub mod graph;
pub mod logging;
pub mod workers;

pub use analyst::Analyst;
pub use asr::{SpeechTranscriber, WhisperCli};
pub use config::{ChunkingConfig, WorkerConfig};
pub use context::WorkerContext;
pub use error::{WorkerError, WorkerResult};
pub use graph::{run_pipeline, Phase, PipelineContext, PipelineState};
pub use logging::JobLogger;

/// Shared binary startup: env file, TLS provider, tracing subscriber.
///
/// Mirrors what every worker binary needs before it can talk to the broker:
/// `dotenvy` for local runs, the ring crypto provider for rustls-backed
/// HTTPS, and a JSON tracing subscriber filtered by `RUST_LOG`.
pub fn init_process(worker_name: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::from_default_env()
                .add_directive("clippipe=info".parse().expect("static directive parses")),
        )
        .init();

    tracing::info!(worker = worker_name, "Starting worker");
}
