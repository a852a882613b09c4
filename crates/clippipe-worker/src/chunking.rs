//! Transcript chunking for the map phase.
//!
//! Long transcripts are split into temporal chunks so each LLM call sees a
//! bounded context. Consecutive chunks share an overlap region so a moment
//! that straddles a boundary is visible to both calls. The walk below is a
//! contract: the overlap is seeded from the just-closed chunk's tail, and the
//! window advances by `chunk_duration - overlap` regardless of where the
//! segments actually fall.

use clippipe_models::TranscriptSegment;
use tracing::debug;

use crate::config::ChunkingConfig;

/// Whether a transcript should take the chunked path.
///
/// Length is measured in characters; the threshold is a property of the
/// prompt/context budget and is tunable through `ChunkingConfig`.
pub fn should_use_chunking(text: &str, threshold_chars: usize) -> bool {
    text.chars().count() > threshold_chars
}

/// Group segments into temporal chunks with overlap.
///
/// Walks the segments in order against a moving window. A segment starting
/// before the window's end joins the current chunk; otherwise the chunk is
/// closed, the window advances (`start = previous end - overlap`), the new
/// chunk is seeded with the closed chunk's segments that start inside the new
/// window, and the segment is appended.
pub fn create_chunks(
    segments: &[TranscriptSegment],
    config: &ChunkingConfig,
) -> Vec<Vec<TranscriptSegment>> {
    if segments.is_empty() {
        return Vec::new();
    }

    let mut chunks: Vec<Vec<TranscriptSegment>> = Vec::new();
    let mut current: Vec<TranscriptSegment> = Vec::new();
    let mut chunk_end = config.chunk_duration_secs;

    for segment in segments {
        if segment.start < chunk_end {
            current.push(segment.clone());
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        let chunk_start = chunk_end - config.overlap_secs;
        chunk_end = chunk_start + config.chunk_duration_secs;

        // Seed the new chunk with the overlap tail of the chunk just closed.
        if let Some(previous) = chunks.last() {
            current = previous
                .iter()
                .filter(|prev| prev.start >= chunk_start)
                .cloned()
                .collect();
        }
        current.push(segment.clone());
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(
        chunks = chunks.len(),
        segments = segments.len(),
        "Transcript chunked"
    );
    chunks
}

/// Concatenated text of a chunk.
pub fn chunk_text(chunk: &[TranscriptSegment]) -> String {
    chunk
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Absolute time range `[start, end]` covered by a chunk.
pub fn chunk_time_range(chunk: &[TranscriptSegment]) -> (f64, f64) {
    match (chunk.first(), chunk.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => (0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment::new(start, end, format!("seg {start}"))
    }

    fn config(duration: f64, overlap: f64) -> ChunkingConfig {
        ChunkingConfig {
            chunk_duration_secs: duration,
            overlap_secs: overlap,
            direct_threshold_chars: 20_000,
        }
    }

    #[test]
    fn test_threshold_boundary() {
        let at_threshold = "x".repeat(20_000);
        let over_threshold = "x".repeat(20_001);
        assert!(!should_use_chunking(&at_threshold, 20_000));
        assert!(should_use_chunking(&over_threshold, 20_000));
    }

    #[test]
    fn test_threshold_counts_chars_not_bytes() {
        let text = "é".repeat(20_000);
        assert!(!should_use_chunking(&text, 20_000));
    }

    #[test]
    fn test_empty_segments_yield_no_chunks() {
        assert!(create_chunks(&[], &config(360.0, 30.0)).is_empty());
    }

    #[test]
    fn test_single_chunk_for_short_input() {
        let segments: Vec<_> = (0..10).map(|i| segment(i as f64 * 10.0, i as f64 * 10.0 + 10.0)).collect();
        let chunks = create_chunks(&segments, &config(360.0, 30.0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 10);
    }

    #[test]
    fn test_overlap_seeding() {
        // 10s window, 2s overlap over segments of 5s each.
        let segments: Vec<_> = (0..4).map(|i| segment(i as f64 * 5.0, i as f64 * 5.0 + 5.0)).collect();
        let chunks = create_chunks(&segments, &config(10.0, 2.0));

        assert_eq!(chunks.len(), 2);
        // First window [0, 10): segments at 0 and 5.
        assert_eq!(chunks[0].len(), 2);
        // Second window starts at 8; no closed segment starts at >= 8, so the
        // chunk holds only the segments at 10 and 15.
        let starts: Vec<f64> = chunks[1].iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![10.0, 15.0]);
    }

    #[test]
    fn test_overlap_tail_is_carried() {
        // Put a segment inside the overlap region so it appears in both chunks.
        let segments = vec![
            segment(0.0, 4.0),
            segment(9.0, 10.0), // starts at 9 >= 8, inside the next window's overlap
            segment(11.0, 14.0),
        ];
        let chunks = create_chunks(&segments, &config(10.0, 2.0));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        let starts: Vec<f64> = chunks[1].iter().map(|s| s.start).collect();
        // The 9.0 segment is both the tail of chunk 1 and the seed of chunk 2.
        assert_eq!(starts, vec![9.0, 11.0]);
    }

    #[test]
    fn test_long_form_chunk_count() {
        // 3600s of speech in 500 segments of 7.2s; 360s windows with 30s
        // overlap advance by 330s: windows at 0, 330, 660, ..., 3300 — 11 chunks.
        let segments: Vec<_> = (0..500)
            .map(|i| segment(i as f64 * 7.2, (i + 1) as f64 * 7.2))
            .collect();
        let chunks = create_chunks(&segments, &config(360.0, 30.0));

        assert_eq!(chunks.len(), 11);
        // Every segment appears at least once.
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(total >= 500);
    }

    #[test]
    fn test_chunk_text_and_range() {
        let chunk = vec![
            TranscriptSegment::new(10.0, 12.0, " hello "),
            TranscriptSegment::new(12.0, 15.0, "world"),
        ];
        assert_eq!(chunk_text(&chunk), "hello  world");
        assert_eq!(chunk_time_range(&chunk), (10.0, 15.0));
        assert_eq!(chunk_time_range(&[]), (0.0, 0.0));
    }
}
