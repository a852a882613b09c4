#![deny(unreachable_patterns)]
//! Shared data models for the ClipPipe pipeline.
//!
//! This crate provides:
//! - Job identity, status and the advisory KV record
//! - The broker message envelope and per-stage payloads
//! - Highlight and transcript schemas
//! - The per-job artifact layout
//! - The burned-in subtitle style contract

pub mod envelope;
pub mod highlight;
pub mod job;
pub mod paths;
pub mod subtitle;
pub mod transcript;

pub use envelope::{
    AnalysePayload, CollectPayload, CompletedPayload, EditPayload, Envelope, Step,
    TranscribePayload, TranscribeSource,
};
pub use highlight::{normalize_highlights, Highlight, HighlightFormatError, HighlightsData};
pub use job::{JobId, JobRecord, JobStatus, SourceKind};
pub use paths::JobPaths;
pub use subtitle::SubtitleStyle;
pub use transcript::{Transcript, TranscriptSegment};
