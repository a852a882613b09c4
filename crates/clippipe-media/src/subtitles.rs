//! Subtitle rendering and clip-local transcript projection.

use std::path::Path;

use clippipe_models::{Transcript, TranscriptSegment};

use crate::error::MediaResult;

/// Minimum duration a projected subtitle cue may have.
const MIN_CUE_SECONDS: f64 = 0.5;

/// Project a transcript onto a clip's local time frame.
///
/// Keeps every segment overlapping `[start, end]`, intersects it with the
/// window, and rebases to clip-local time (subtracting `start`). Survivors
/// that collapse to zero length are widened to half a second so renderers do
/// not drop them.
pub fn clip_transcript(transcript: &Transcript, start: f64, end: f64) -> Vec<TranscriptSegment> {
    let mut clipped = Vec::new();
    for segment in &transcript.segments {
        if segment.end < start || segment.start > end {
            continue;
        }
        let new_start = segment.start.max(start) - start;
        let new_end = segment.end.min(end) - start;
        clipped.push(TranscriptSegment {
            start: new_start,
            end: if new_end > new_start {
                new_end
            } else {
                new_start + MIN_CUE_SECONDS
            },
            text: segment.text.trim().to_string(),
        });
    }
    clipped
}

/// Write segments as an SRT file.
pub async fn write_srt(segments: &[TranscriptSegment], output_path: impl AsRef<Path>) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut content = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let (start, end) = cue_bounds(segment);
        content.push_str(&format!("{}\n", i + 1));
        content.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(start),
            format_srt_timestamp(end)
        ));
        content.push_str(segment.text.trim());
        content.push_str("\n\n");
    }

    tokio::fs::write(output_path, content).await?;
    Ok(())
}

/// Write segments as a WebVTT file.
pub async fn write_vtt(segments: &[TranscriptSegment], output_path: impl AsRef<Path>) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut content = String::from("WEBVTT\n\n");
    for segment in segments {
        let (start, end) = cue_bounds(segment);
        content.push_str(&format!(
            "{} --> {}\n",
            format_vtt_timestamp(start),
            format_vtt_timestamp(end)
        ));
        content.push_str(segment.text.trim());
        content.push_str("\n\n");
    }

    tokio::fs::write(output_path, content).await?;
    Ok(())
}

/// A cue never renders with `end <= start`.
fn cue_bounds(segment: &TranscriptSegment) -> (f64, f64) {
    let start = segment.start.max(0.0);
    let end = if segment.end > start {
        segment.end
    } else {
        start + MIN_CUE_SECONDS
    };
    (start, end)
}

/// `HH:MM:SS,mmm` (SRT separator is a comma).
pub fn format_srt_timestamp(t: f64) -> String {
    let (h, m, s, ms) = split_timestamp(t);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// `HH:MM:SS.mmm` (VTT separator is a dot).
pub fn format_vtt_timestamp(t: f64) -> String {
    let (h, m, s, ms) = split_timestamp(t);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

fn split_timestamp(t: f64) -> (u64, u64, u64, u64) {
    let t = t.max(0.0);
    let total = t.floor() as u64;
    let ms = ((t - t.floor()) * 1000.0).round() as u64;
    // Rounding can carry into the next second.
    let (total, ms) = if ms >= 1000 { (total + 1, 0) } else { (total, ms) };
    (total / 3600, (total % 3600) / 60, total % 60, ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(segments: Vec<TranscriptSegment>) -> Transcript {
        Transcript {
            text: String::new(),
            language: "en".to_string(),
            duration: 0.0,
            segments,
        }
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(3661.25), "01:01:01,250");
        assert_eq!(format_vtt_timestamp(59.9996), "00:01:00.000");
        assert_eq!(format_vtt_timestamp(90.5), "00:01:30.500");
    }

    #[test]
    fn test_clip_transcript_projection() {
        let t = transcript(vec![
            TranscriptSegment::new(0.0, 5.0, "before"),
            TranscriptSegment::new(8.0, 14.0, " spans entry "),
            TranscriptSegment::new(15.0, 18.0, "inside"),
            TranscriptSegment::new(19.0, 26.0, "spans exit"),
            TranscriptSegment::new(30.0, 35.0, "after"),
        ]);

        let clipped = clip_transcript(&t, 10.0, 20.0);

        assert_eq!(clipped.len(), 3);
        // Entry-spanning segment is intersected and rebased.
        assert_eq!(clipped[0].start, 0.0);
        assert_eq!(clipped[0].end, 4.0);
        assert_eq!(clipped[0].text, "spans entry");
        // Fully inside.
        assert_eq!(clipped[1].start, 5.0);
        assert_eq!(clipped[1].end, 8.0);
        // Exit-spanning segment clamps to the window end.
        assert_eq!(clipped[2].start, 9.0);
        assert_eq!(clipped[2].end, 10.0);
    }

    #[test]
    fn test_clip_transcript_widens_zero_length() {
        // A segment touching the window only at its edge collapses to zero
        // length and must be widened.
        let t = transcript(vec![TranscriptSegment::new(5.0, 10.0, "edge")]);
        let clipped = clip_transcript(&t, 10.0, 20.0);
        assert_eq!(clipped.len(), 1);
        assert_eq!(clipped[0].start, 0.0);
        assert_eq!(clipped[0].end, 0.5);
    }

    #[tokio::test]
    async fn test_write_srt_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let segments = vec![
            TranscriptSegment::new(0.0, 2.5, "first line"),
            TranscriptSegment::new(3.0, 3.0, "degenerate"),
        ];

        write_srt(&segments, &path).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();

        assert!(content.starts_with("1\n00:00:00,000 --> 00:00:02,500\nfirst line\n"));
        // Degenerate cue widened to 0.5s.
        assert!(content.contains("00:00:03,000 --> 00:00:03,500\ndegenerate"));
    }

    #[tokio::test]
    async fn test_write_vtt_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.vtt");
        let segments = vec![TranscriptSegment::new(1.0, 2.0, "hello")];

        write_vtt(&segments, &path).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();

        assert!(content.starts_with("WEBVTT\n\n"));
        assert!(content.contains("00:00:01.000 --> 00:00:02.000\nhello"));
    }
}
