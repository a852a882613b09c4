//! Job identity, status and the advisory state record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length of a user-visible error message carried in the record.
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Unique identifier for a job.
///
/// Opaque, URL-safe and filesystem-safe: it doubles as the per-job directory
/// name under the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID (12 lowercase hex chars).
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..12].to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Derive the ID of the `index`-th segment sub-job of this job.
    ///
    /// Stream fan-out children are named `<parent>_segNNN` with a zero-padded
    /// three-digit index, in deterministic segment order.
    pub fn segment_child(&self, index: usize) -> Self {
        Self(format!("{}_seg{:03}", self.0, index))
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a job.
///
/// Transitions are monotone: PENDING → PROCESSING → {COMPLETED, FAILED};
/// the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Job has been created but no worker has picked it up yet
    #[default]
    Pending,
    /// A worker currently owns the job's next step
    Processing,
    /// Job finished; `output_path` names the first clip
    Completed,
    /// Job failed; the terminal step name records where
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a source URL is a recorded video or a live stream.
///
/// Streams get a COLLECT stage inserted in front of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Recorded,
    Stream,
}

const STREAM_PREFIXES: [&str; 2] = ["rtmp://", "rtsp://"];
const STREAM_SUFFIXES: [&str; 1] = [".m3u8"];
const LIVE_HOSTS: [&str; 3] = ["youtube.com/", "twitch.tv", "facebook.com"];

impl SourceKind {
    /// Classify a source URL.
    pub fn classify(url: &str) -> Self {
        let lower = url.to_lowercase();
        if STREAM_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return SourceKind::Stream;
        }
        if STREAM_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
            return SourceKind::Stream;
        }
        if lower.contains("live") && LIVE_HOSTS.iter().any(|h| lower.contains(h)) {
            return SourceKind::Stream;
        }
        SourceKind::Recorded
    }
}

fn default_max_highlights() -> u8 {
    5
}

/// The advisory job record stored in the KV state store under `job:<job_id>`.
///
/// The record is a convenience for status queries; pipeline correctness never
/// depends on it. It is mutated only by the worker currently holding the
/// broker delivery for this job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    /// Job ID
    pub job_id: JobId,

    /// Input URL
    pub source_url: String,

    /// Lifecycle status
    #[serde(default)]
    pub status: JobStatus,

    /// Latest stage reached (e.g. `transcribe`, `analyse`, `edit_failed`)
    pub current_step: String,

    /// Coarse user-visible progress stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_stage: Option<String>,

    /// Progress percent, 0-100
    #[serde(default)]
    pub progress_percent: u8,

    /// Human-readable progress message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Parent job (for per-segment sub-jobs); immutable once set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<JobId>,

    /// Index of this segment within the parent's fan-out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<u32>,

    /// Total segments in the parent's fan-out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u32>,

    /// Number of sub-jobs actually published by the collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_published: Option<u32>,

    /// Number of sub-jobs observed terminal by the finalizer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_completed: Option<u32>,

    /// Path to this sub-job's segment file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_path: Option<String>,

    /// Path of the first emitted clip (set on completion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,

    /// Source video title, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Thumbnail of the first clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,

    /// Last error message (truncated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Caller-supplied cap on emitted highlights (1-20)
    #[serde(default = "default_max_highlights")]
    pub max_highlights: u8,

    /// Whether clips get burned-in subtitles
    #[serde(default)]
    pub include_subtitles: bool,

    /// Named subtitle style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_style: Option<String>,
}

impl JobRecord {
    /// Create a fresh PENDING record for a newly initialized job.
    pub fn new(job_id: JobId, source_url: impl Into<String>) -> Self {
        Self {
            job_id,
            source_url: source_url.into(),
            status: JobStatus::Pending,
            current_step: "START".to_string(),
            progress_stage: None,
            progress_percent: 0,
            progress_message: None,
            created_at: Utc::now(),
            parent_job_id: None,
            segment_index: None,
            total_segments: None,
            segments_published: None,
            segments_completed: None,
            segment_path: None,
            output_path: None,
            title: None,
            thumbnail_path: None,
            error: None,
            max_highlights: default_max_highlights(),
            include_subtitles: false,
            subtitle_style: None,
        }
    }

    /// Clamp the highlight cap into its valid 1-20 range.
    pub fn with_max_highlights(mut self, max_highlights: u8) -> Self {
        self.max_highlights = max_highlights.clamp(1, 20);
        self
    }

    /// Mark the job as PROCESSING a given step.
    pub fn start_step(&mut self, step: impl Into<String>) {
        self.status = JobStatus::Processing;
        self.current_step = step.into();
    }

    /// Record progress. The percent is monotone non-decreasing for a live job.
    pub fn set_progress(&mut self, stage: impl Into<String>, percent: u8, message: impl Into<String>) {
        self.progress_stage = Some(stage.into());
        self.progress_percent = self.progress_percent.max(percent.min(100));
        self.progress_message = Some(message.into());
    }

    /// Mark the job COMPLETED with its first clip.
    pub fn complete(&mut self, output_path: impl Into<String>) {
        self.status = JobStatus::Completed;
        self.current_step = "completed".to_string();
        self.output_path = Some(output_path.into());
        self.progress_percent = 100;
        self.progress_message = Some("Concluído!".to_string());
    }

    /// Mark the job FAILED at a terminal step.
    ///
    /// The percent resets to 0 and the error message is truncated to 200
    /// characters (the only case where the percent may go backwards).
    pub fn fail(&mut self, step: impl Into<String>, error: impl Into<String>) {
        let error = truncate_chars(&error.into(), MAX_ERROR_MESSAGE_LEN);
        self.status = JobStatus::Failed;
        self.current_step = step.into();
        self.progress_percent = 0;
        self.progress_message = Some(error.clone());
        self.error = Some(error);
    }
}

/// Truncate a string to at most `max` characters (not bytes).
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_segment_child() {
        let parent = JobId::from("abc123");
        assert_eq!(parent.segment_child(0).as_str(), "abc123_seg000");
        assert_eq!(parent.segment_child(17).as_str(), "abc123_seg017");
        assert_eq!(parent.segment_child(123).as_str(), "abc123_seg123");
    }

    #[test]
    fn test_job_id_is_url_safe() {
        let id = JobId::new();
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_classify_stream_urls() {
        assert_eq!(SourceKind::classify("rtmp://host/app"), SourceKind::Stream);
        assert_eq!(SourceKind::classify("rtsp://cam/1"), SourceKind::Stream);
        assert_eq!(
            SourceKind::classify("https://cdn.example/playlist.m3u8"),
            SourceKind::Stream
        );
        assert_eq!(
            SourceKind::classify("https://youtube.com/live/abcdef"),
            SourceKind::Stream
        );
        assert_eq!(
            SourceKind::classify("https://example.com/video.mp4"),
            SourceKind::Recorded
        );
        assert_eq!(
            SourceKind::classify("https://youtube.com/watch?v=abc"),
            SourceKind::Recorded
        );
    }

    #[test]
    fn test_status_serialization_is_screaming() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            "\"PENDING\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Failed).unwrap(),
            "\"FAILED\""
        );
    }

    #[test]
    fn test_record_lifecycle() {
        let mut record = JobRecord::new(JobId::from("job1"), "https://example.com/v.mp4");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.current_step, "START");
        assert_eq!(record.progress_percent, 0);

        record.start_step("transcribe");
        assert_eq!(record.status, JobStatus::Processing);

        record.set_progress("transcribing", 20, "Baixando vídeo...");
        record.set_progress("transcribing", 10, "late waypoint");
        // Monotone: a stale lower percent never wins.
        assert_eq!(record.progress_percent, 20);

        record.complete("/data/job1/clips/clip_01.mp4");
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.progress_percent, 100);
        assert!(record.output_path.is_some());
    }

    #[test]
    fn test_fail_resets_percent_and_truncates() {
        let mut record = JobRecord::new(JobId::from("job1"), "url");
        record.set_progress("analyzing", 50, "half way");

        let long_error = "x".repeat(500);
        record.fail("analyse_failed", &long_error);

        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.progress_percent, 0);
        assert_eq!(record.error.as_deref().unwrap().chars().count(), 200);
        assert_eq!(record.current_step, "analyse_failed");
    }

    #[test]
    fn test_max_highlights_clamped() {
        let record = JobRecord::new(JobId::from("j"), "url").with_max_highlights(50);
        assert_eq!(record.max_highlights, 20);
        let record = JobRecord::new(JobId::from("j"), "url").with_max_highlights(0);
        assert_eq!(record.max_highlights, 1);
    }
}
