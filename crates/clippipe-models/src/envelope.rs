//! The broker message envelope and per-stage payloads.
//!
//! Every queue message is `{ job_id, step, payload }` where `step` names the
//! stage about to consume it and `payload` is a stage-specific record. The
//! envelope is the authoritative lease on a job's next step: exactly one
//! worker holds an unacknowledged delivery per stage per job.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::JobId;

/// Pipeline stage names, as they appear in `Envelope::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Collect,
    Transcribe,
    Analyse,
    Edit,
    Completed,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Collect => "collect",
            Step::Transcribe => "transcribe",
            Step::Analyse => "analyse",
            Step::Edit => "edit",
            Step::Completed => "completed",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queue message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Envelope {
    /// Job this message belongs to
    pub job_id: JobId,

    /// Stage about to consume the message
    pub step: String,

    /// Stage-specific payload
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Build an envelope for a stage with a typed payload.
    ///
    /// Serialization of the payload cannot fail for the payload types in this
    /// crate (plain structs of strings and numbers), so a failure here is a
    /// programming error surfaced as a serde error.
    pub fn new<P: Serialize>(job_id: JobId, step: Step, payload: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            job_id,
            step: step.as_str().to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Parse the payload into a stage-specific type.
    pub fn parse_payload<P: for<'de> Deserialize<'de>>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

fn default_segment_duration() -> u64 {
    30
}

fn default_max_duration() -> u64 {
    300
}

/// Payload of a `collect` message: capture a live stream into fixed-duration
/// segments.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CollectPayload {
    /// Stream URL (HLS, RTMP/RTSP, or a platform page URL)
    pub stream_url: String,

    /// Duration of each captured segment, seconds (10-600)
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u64,

    /// Maximum total capture duration, seconds (30-3600)
    #[serde(default = "default_max_duration")]
    pub max_duration: u64,
}

impl CollectPayload {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            segment_duration: default_segment_duration(),
            max_duration: default_max_duration(),
        }
    }

    /// Clamp both durations into their valid ranges.
    pub fn clamped(mut self) -> Self {
        self.segment_duration = self.segment_duration.clamp(10, 600);
        self.max_duration = self.max_duration.clamp(30, 3600);
        self
    }

    /// Expected number of segments for a full-length capture.
    pub fn expected_segments(&self) -> u64 {
        self.max_duration / self.segment_duration
    }
}

/// Payload of a `transcribe` message.
///
/// Two shapes share the queue: the recorded branch carries a source `url` to
/// download, the stream branch carries a `segment_path` already on disk plus
/// its fan-out coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TranscribePayload {
    /// Source URL (recorded branch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Path of an already-captured segment (stream branch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_path: Option<String>,

    /// Index of the segment within the parent's fan-out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_index: Option<u32>,

    /// Total segments in the parent's fan-out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u32>,

    /// The fan-out parent job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_job_id: Option<JobId>,
}

/// Resolved input of a transcribe message.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscribeSource {
    /// Download from this URL first
    Url(String),
    /// Media already on disk
    LocalFile(String),
}

impl TranscribePayload {
    /// Build the recorded-branch payload.
    pub fn recorded(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Build a stream-branch payload for one fan-out segment.
    pub fn segment(
        segment_path: impl Into<String>,
        segment_index: u32,
        total_segments: u32,
        parent_job_id: JobId,
    ) -> Self {
        Self {
            url: None,
            segment_path: Some(segment_path.into()),
            segment_index: Some(segment_index),
            total_segments: Some(total_segments),
            parent_job_id: Some(parent_job_id),
        }
    }

    /// Resolve which input this message carries.
    ///
    /// A payload with neither field is malformed and the message belongs in
    /// the DLQ.
    pub fn source(&self) -> Option<TranscribeSource> {
        if let Some(path) = &self.segment_path {
            return Some(TranscribeSource::LocalFile(path.clone()));
        }
        self.url.as_ref().map(|u| TranscribeSource::Url(u.clone()))
    }
}

/// Payload of an `analyse` message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysePayload {
    /// Transcript JSON produced by the transcriber
    pub transcription_path: String,

    /// Local media file the transcript describes
    pub video_path: String,
}

/// Payload of an `edit` message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EditPayload {
    /// Highlights JSON produced by the analyst
    pub highlight_path: String,

    /// Local media file to cut
    pub video_path: String,

    /// Transcript, kept so the editor can render burned-in subtitles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_path: Option<String>,
}

/// Payload of a `completed` message (terminal, informational).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompletedPayload {
    /// First emitted clip
    pub final_video_path: String,

    /// The source media the clips were cut from
    pub original_video_path: String,

    /// The highlights JSON the clips were cut against
    pub highlight_json_path: String,

    /// Every emitted clip, in highlight order
    #[serde(default)]
    pub clips_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let payload = AnalysePayload {
            transcription_path: "/data/j1/transcription.json".to_string(),
            video_path: "/data/j1/temp_video.mp4".to_string(),
        };
        let envelope = Envelope::new(JobId::from("j1"), Step::Analyse, &payload).unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.job_id.as_str(), "j1");
        assert_eq!(parsed.step, "analyse");
        let back: AnalysePayload = parsed.parse_payload().unwrap();
        assert_eq!(back.transcription_path, payload.transcription_path);
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = Envelope::new(
            JobId::from("abc"),
            Step::Transcribe,
            &TranscribePayload::recorded("https://example.com/v"),
        )
        .unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["job_id"], "abc");
        assert_eq!(value["step"], "transcribe");
        assert_eq!(value["payload"]["url"], "https://example.com/v");
        // Stream-only fields must not leak into the recorded shape.
        assert!(value["payload"].get("segment_path").is_none());
    }

    #[test]
    fn test_collect_payload_defaults_and_clamping() {
        let payload: CollectPayload =
            serde_json::from_str(r#"{"stream_url":"rtmp://x"}"#).unwrap();
        assert_eq!(payload.segment_duration, 30);
        assert_eq!(payload.max_duration, 300);

        let clamped = CollectPayload {
            stream_url: "rtmp://x".to_string(),
            segment_duration: 5,
            max_duration: 10_000,
        }
        .clamped();
        assert_eq!(clamped.segment_duration, 10);
        assert_eq!(clamped.max_duration, 3600);
    }

    #[test]
    fn test_expected_segments() {
        let payload = CollectPayload {
            stream_url: "rtmp://x".to_string(),
            segment_duration: 30,
            max_duration: 120,
        };
        assert_eq!(payload.expected_segments(), 4);
    }

    #[test]
    fn test_transcribe_source_resolution() {
        let recorded = TranscribePayload::recorded("https://example.com/v");
        assert_eq!(
            recorded.source(),
            Some(TranscribeSource::Url("https://example.com/v".to_string()))
        );

        let segment = TranscribePayload::segment("/data/p/segments/segment_000.mp4", 0, 4, JobId::from("p"));
        assert_eq!(
            segment.source(),
            Some(TranscribeSource::LocalFile(
                "/data/p/segments/segment_000.mp4".to_string()
            ))
        );

        let empty = TranscribePayload::default();
        assert_eq!(empty.source(), None);
    }
}
