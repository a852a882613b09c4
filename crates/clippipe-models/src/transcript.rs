//! Transcript schema shared by the ASR seam, the analyst and the editor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One timestamped span of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    /// Start time, seconds
    pub start: f64,

    /// End time, seconds
    pub end: f64,

    /// Transcribed text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// The transcript persisted as `transcription.json`.
///
/// The shape mirrors what Whisper-style engines emit: the full text plus the
/// list of timestamped segments. Extra engine-specific fields are ignored on
/// read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    /// Full transcribed text
    #[serde(default)]
    pub text: String,

    /// Detected language code
    #[serde(default)]
    pub language: String,

    /// Media duration, seconds
    #[serde(default)]
    pub duration: f64,

    /// Timestamped segments in temporal order
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    /// Effective duration: the declared duration, or the end of the last
    /// segment when the engine did not report one.
    pub fn effective_duration(&self) -> f64 {
        if self.duration > 0.0 {
            return self.duration;
        }
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}
