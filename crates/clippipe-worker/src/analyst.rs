//! Transcript analysis: turning a transcript into a ranked, deduplicated,
//! temporally diversified set of highlights.
//!
//! Two paths share one output contract. Short transcripts go to the LLM in a
//! single call; long ones are chunked (map) and the per-chunk candidates are
//! consolidated (reduce). The reduce ordering — dedup, then diversify, then
//! truncate, then chronological sort — is load-bearing: changing it changes
//! which highlights survive.

use serde::Deserialize;
use tracing::{info, warn};

use clippipe_models::{Highlight, Transcript, TranscriptSegment};

use crate::chunking::{chunk_text, chunk_time_range, create_chunks, should_use_chunking};
use crate::config::ChunkingConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::gemini::GeminiClient;

/// Score assigned to highlights the LLM returned without one.
const DEFAULT_SCORE: f64 = 50.0;

/// Overlap ratio above which two highlights are the same moment.
const DUP_OVERLAP_RATIO: f64 = 0.7;

/// Tolerance for LLM timestamp rounding at a chunk's right edge, seconds.
const CHUNK_RANGE_TOLERANCE: f64 = 5.0;

/// Cap on temporal diversification buckets.
const MAX_BUCKETS: usize = 5;

/// Transcript analyst backed by an LLM collaborator.
pub struct Analyst {
    llm: GeminiClient,
    config: ChunkingConfig,
}

/// The reply schema the LLM is required to produce.
#[derive(Debug, Deserialize)]
struct HighlightsReply {
    highlights: Vec<Highlight>,
}

impl Analyst {
    pub fn new(llm: GeminiClient, config: ChunkingConfig) -> Self {
        Self { llm, config }
    }

    /// Analyse a transcript and emit at most `max_highlights` highlights in
    /// chronological order.
    pub async fn analyse(
        &self,
        transcript: &Transcript,
        max_highlights: usize,
    ) -> WorkerResult<Vec<Highlight>> {
        let text = transcript.text.trim();
        if text.is_empty() {
            return Err(WorkerError::job_failed("transcript is empty"));
        }

        if !should_use_chunking(text, self.config.direct_threshold_chars) {
            info!(chars = text.chars().count(), "Using direct analysis path");
            return self.analyse_direct(text, max_highlights).await;
        }

        info!(chars = text.chars().count(), "Using chunked analysis path");
        self.analyse_chunked(transcript, max_highlights).await
    }

    /// Single-call path for transcripts within the context budget.
    async fn analyse_direct(&self, text: &str, max_highlights: usize) -> WorkerResult<Vec<Highlight>> {
        let prompt = build_direct_prompt(text, max_highlights);
        let reply = self.llm.generate(&prompt).await?;
        let candidates = parse_highlights_reply(&reply)?;
        Ok(reduce_highlights(candidates, max_highlights))
    }

    /// Map-reduce path: one LLM call per temporal chunk, then consolidation.
    async fn analyse_chunked(
        &self,
        transcript: &Transcript,
        max_highlights: usize,
    ) -> WorkerResult<Vec<Highlight>> {
        // A transcript with text but no segment timestamps cannot be windowed;
        // treat the whole text as one chunk.
        let chunks: Vec<Vec<TranscriptSegment>> = if transcript.segments.is_empty() {
            warn!("Transcript has no segments, analysing the full text as one chunk");
            vec![vec![TranscriptSegment::new(
                0.0,
                transcript.effective_duration(),
                transcript.text.clone(),
            )]]
        } else {
            create_chunks(&transcript.segments, &self.config)
        };

        info!(chunks = chunks.len(), "Analysing transcript chunks");

        let mut candidates = Vec::new();
        let mut failed_chunks = 0usize;

        for (index, chunk) in chunks.iter().enumerate() {
            let (chunk_start, chunk_end) = chunk_time_range(chunk);
            let prompt = build_chunk_prompt(&chunk_text(chunk), chunk_start, chunk_end);

            // A single bad chunk must not sink the job; it is logged and
            // skipped as long as some other chunk produces candidates.
            let parsed = match self.llm.generate(&prompt).await {
                Ok(reply) => parse_highlights_reply(&reply),
                Err(e) => Err(e),
            };

            match parsed {
                Ok(highlights) => {
                    let kept = filter_in_range(highlights, chunk_start, chunk_end);
                    info!(
                        chunk = index + 1,
                        total = chunks.len(),
                        kept = kept.len(),
                        "Chunk analysed"
                    );
                    candidates.extend(kept);
                }
                Err(e) => {
                    failed_chunks += 1;
                    warn!(
                        chunk = index + 1,
                        total = chunks.len(),
                        error = %e,
                        "Chunk analysis failed, skipping"
                    );
                }
            }
        }

        if candidates.is_empty() {
            return Err(WorkerError::job_failed(format!(
                "no chunk produced a valid highlight ({failed_chunks} chunk(s) failed)"
            )));
        }

        Ok(reduce_highlights(candidates, max_highlights))
    }
}

/// Parse and validate an LLM reply against the highlights schema.
///
/// `start < end` is mandatory for every entry; a reply violating it (or not
/// parsing at all) is a stage error.
pub fn parse_highlights_reply(reply: &str) -> WorkerResult<Vec<Highlight>> {
    let parsed: HighlightsReply = serde_json::from_str(reply)
        .map_err(|e| WorkerError::LlmInvalidReply(e.to_string()))?;

    for h in &parsed.highlights {
        if !(h.start >= 0.0 && h.start < h.end) {
            return Err(WorkerError::LlmInvalidReply(format!(
                "invalid interval [{}, {}]",
                h.start, h.end
            )));
        }
    }

    Ok(parsed.highlights)
}

/// Drop per-chunk highlights the LLM placed outside its chunk.
///
/// The right edge gets a small tolerance to absorb timestamp rounding.
/// A degenerate range (no usable timestamps, e.g. the whole-text fallback
/// chunk of an untimed transcript) cannot validate anything and keeps all.
fn filter_in_range(highlights: Vec<Highlight>, chunk_start: f64, chunk_end: f64) -> Vec<Highlight> {
    if chunk_end <= chunk_start {
        return highlights;
    }
    highlights
        .into_iter()
        .filter(|h| {
            let in_range = h.start >= chunk_start && h.end <= chunk_end + CHUNK_RANGE_TOLERANCE;
            if !in_range {
                warn!(
                    start = h.start,
                    end = h.end,
                    chunk_start,
                    chunk_end,
                    "Discarding out-of-range highlight"
                );
            }
            in_range
        })
        .collect()
}

/// Consolidate candidate highlights into the final emit list.
///
/// Order of operations (a contract, see module docs):
/// 1. normalize missing scores to 50.0;
/// 2. sort by score descending;
/// 3. greedy overlap dedup at ratio > 0.7;
/// 4. temporal diversification when more than `2 * max_highlights` survive;
/// 5. truncate to `max_highlights` and sort chronologically.
pub fn reduce_highlights(candidates: Vec<Highlight>, max_highlights: usize) -> Vec<Highlight> {
    if max_highlights == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<Highlight> = candidates
        .into_iter()
        .map(|mut h| {
            if h.score.is_none() {
                h.score = Some(DEFAULT_SCORE);
            }
            h
        })
        .collect();

    sort_by_score_desc(&mut candidates);

    // Greedy dedup in descending score order: the better-scored duplicate wins.
    let mut survivors: Vec<Highlight> = Vec::new();
    for candidate in candidates {
        let duplicate = survivors
            .iter()
            .any(|kept| kept.overlap_ratio(&candidate) > DUP_OVERLAP_RATIO);
        if !duplicate {
            survivors.push(candidate);
        }
    }

    let mut selected = if survivors.len() > 2 * max_highlights {
        diversify(survivors, max_highlights)
    } else {
        survivors
    };

    selected.truncate(max_highlights);
    selected.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
    selected
}

/// Spread the selection across the video's timeline.
///
/// Divides `[0, max(end)]` into equal-width buckets, takes the top
/// `ceil(max / buckets)` per bucket by score, tops up from the remaining
/// survivors when short, and re-sorts by score.
fn diversify(survivors: Vec<Highlight>, max_highlights: usize) -> Vec<Highlight> {
    let duration = survivors.iter().map(|h| h.end).fold(0.0f64, f64::max);
    if duration <= 0.0 {
        return survivors;
    }

    let num_buckets = max_highlights.min(MAX_BUCKETS).max(1);
    let bucket_width = duration / num_buckets as f64;
    let per_bucket = max_highlights.div_ceil(num_buckets);

    let mut buckets: Vec<Vec<Highlight>> = vec![Vec::new(); num_buckets];
    // `survivors` is already sorted by score descending, so each bucket fills
    // with its best candidates first.
    let mut leftovers: Vec<Highlight> = Vec::new();
    for highlight in survivors {
        let index = ((highlight.start / bucket_width).floor() as usize).min(num_buckets - 1);
        if buckets[index].len() < per_bucket {
            buckets[index].push(highlight);
        } else {
            leftovers.push(highlight);
        }
    }

    let mut selected: Vec<Highlight> = buckets.into_iter().flatten().collect();

    if selected.len() < max_highlights {
        for highlight in leftovers {
            if selected.len() >= max_highlights {
                break;
            }
            selected.push(highlight);
        }
    }

    sort_by_score_desc(&mut selected);
    selected
}

fn sort_by_score_desc(highlights: &mut [Highlight]) {
    highlights.sort_by(|a, b| {
        let sa = a.score.unwrap_or(DEFAULT_SCORE);
        let sb = b.score.unwrap_or(DEFAULT_SCORE);
        sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Prompt for the direct (single-call) path.
fn build_direct_prompt(text: &str, max_highlights: usize) -> String {
    format!(
        r#"You are a video editor specialized in short viral clips.
Below is the full transcript of a video with per-segment timestamps in seconds.

Select up to {max_highlights} self-contained moments worth publishing as short clips.

Return ONLY a single JSON object with this schema:
{{
  "highlights": [
    {{"start": 12.0, "end": 45.5, "summary": "why this moment works", "score": 85.0}}
  ]
}}

Rules:
- "start" and "end" are seconds from the beginning of the video, start < end.
- Prefer moments of 20-90 seconds with a beginning, middle and end.
- "score" is 0-100, higher means more engaging.

TRANSCRIPT:
{text}
"#
    )
}

/// Prompt for one chunk of the map phase.
fn build_chunk_prompt(text: &str, chunk_start: f64, chunk_end: f64) -> String {
    format!(
        r#"You are a video editor specialized in short viral clips.
Below is an excerpt of a longer video transcript covering the time range
[{chunk_start:.1}s - {chunk_end:.1}s].

Select 3 to 5 self-contained moments from this excerpt.

Return ONLY a single JSON object with this schema:
{{
  "highlights": [
    {{"start": {chunk_start:.1}, "end": {chunk_end:.1}, "summary": "why this moment works", "score": 85.0}}
  ]
}}

Rules:
- "start" and "end" are absolute seconds from the beginning of the video.
- Both must fall inside [{chunk_start:.1}, {chunk_end:.1}], start < end.
- Prefer moments of 20-90 seconds with a beginning, middle and end.
- "score" is 0-100, higher means more engaging.

EXCERPT:
{text}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(start: f64, end: f64, score: f64) -> Highlight {
        Highlight::new(start, end).with_score(score)
    }

    #[test]
    fn test_parse_valid_reply() {
        let reply = r#"{"highlights":[{"start":10.0,"end":30.0,"summary":"x","score":80.0}]}"#;
        let highlights = parse_highlights_reply(reply).unwrap();
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].start, 10.0);
    }

    #[test]
    fn test_parse_rejects_inverted_interval() {
        let reply = r#"{"highlights":[{"start":30.0,"end":10.0}]}"#;
        assert!(matches!(
            parse_highlights_reply(reply),
            Err(WorkerError::LlmInvalidReply(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_schema_reply() {
        assert!(matches!(
            parse_highlights_reply(r#"{"moments": []}"#),
            Err(WorkerError::LlmInvalidReply(_))
        ));
        assert!(matches!(
            parse_highlights_reply("not json"),
            Err(WorkerError::LlmInvalidReply(_))
        ));
    }

    #[test]
    fn test_filter_in_range_degenerate_keeps_all() {
        let highlights = vec![h(0.0, 30.0, 80.0), h(500.0, 560.0, 70.0)];
        let kept = filter_in_range(highlights, 0.0, 0.0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_filter_in_range_tolerance() {
        let highlights = vec![
            h(100.0, 150.0, 80.0),  // inside
            h(90.0, 150.0, 80.0),   // starts before the chunk
            h(100.0, 204.0, 80.0),  // ends within the +5s tolerance
            h(100.0, 206.0, 80.0),  // past the tolerance
        ];
        let kept = filter_in_range(highlights, 100.0, 200.0);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].end, 150.0);
        assert_eq!(kept[1].end, 204.0);
    }

    #[test]
    fn test_reduce_defaults_missing_scores() {
        let candidates = vec![Highlight::new(0.0, 10.0), h(100.0, 110.0, 90.0)];
        let reduced = reduce_highlights(candidates, 5);
        assert_eq!(reduced.len(), 2);
        let unscored = reduced.iter().find(|x| x.start == 0.0).unwrap();
        assert_eq!(unscored.score, Some(50.0));
    }

    #[test]
    fn test_reduce_dedups_by_overlap() {
        let candidates = vec![
            h(10.0, 40.0, 90.0),
            h(12.0, 38.0, 70.0),  // nested inside the first: ratio 1.0 → dup
            h(100.0, 130.0, 60.0),
        ];
        let reduced = reduce_highlights(candidates, 5);
        assert_eq!(reduced.len(), 2);
        // The higher-scored duplicate wins.
        assert!(reduced.iter().any(|x| x.score == Some(90.0)));
        assert!(!reduced.iter().any(|x| x.score == Some(70.0)));
    }

    #[test]
    fn test_reduce_keeps_partial_overlaps() {
        // 50% overlap is below the 0.7 threshold: both survive.
        let candidates = vec![h(0.0, 20.0, 90.0), h(10.0, 30.0, 80.0)];
        let reduced = reduce_highlights(candidates, 5);
        assert_eq!(reduced.len(), 2);
    }

    #[test]
    fn test_reduce_count_and_chronological_order() {
        let candidates = vec![
            h(300.0, 330.0, 90.0),
            h(0.0, 30.0, 80.0),
            h(150.0, 180.0, 75.0),
            h(600.0, 630.0, 60.0),
            h(450.0, 480.0, 55.0),
        ];
        let reduced = reduce_highlights(candidates, 3);

        // I4: min(|candidates|, max) entries, sorted by start ascending.
        assert_eq!(reduced.len(), 3);
        let starts: Vec<f64> = reduced.iter().map(|x| x.start).collect();
        assert_eq!(starts, vec![0.0, 150.0, 300.0]);
    }

    #[test]
    fn test_reduce_fewer_candidates_than_cap() {
        let reduced = reduce_highlights(vec![h(5.0, 15.0, 50.0)], 5);
        assert_eq!(reduced.len(), 1);
    }

    #[test]
    fn test_reduce_pairwise_overlap_invariant() {
        // I3: no two survivors overlap by more than 0.7.
        let candidates: Vec<Highlight> = (0..30)
            .map(|i| h(i as f64 * 3.0, i as f64 * 3.0 + 20.0, 50.0 + i as f64))
            .collect();
        let reduced = reduce_highlights(candidates, 5);

        for a in &reduced {
            for b in &reduced {
                if a.start != b.start {
                    assert!(a.overlap_ratio(b) <= DUP_OVERLAP_RATIO + 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_diversification_spreads_buckets() {
        // 22 disjoint candidates across a 3600s video, cap 5: diversification
        // kicks in (22 > 10) and the picks must span at least 3 of 5 buckets.
        let mut candidates = Vec::new();
        for i in 0..22 {
            let start = i as f64 * 160.0;
            candidates.push(h(start, start + 40.0, 40.0 + i as f64 * 2.0));
        }
        let reduced = reduce_highlights(candidates, 5);

        assert_eq!(reduced.len(), 5);
        // Effective duration is the max candidate end (21 * 160 + 40).
        let bucket_width = 3400.0 / 5.0;
        let mut buckets: std::collections::HashSet<usize> = std::collections::HashSet::new();
        for x in &reduced {
            buckets.insert(((x.start / bucket_width).floor() as usize).min(4));
        }
        assert!(buckets.len() >= 3, "picks span only {} buckets", buckets.len());

        let starts: Vec<f64> = reduced.iter().map(|x| x.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(starts, sorted);
    }

    #[test]
    fn test_diversification_skipped_when_few_survivors() {
        // 6 survivors with cap 5 (6 <= 10): straight score cut, no bucketing.
        let candidates = vec![
            h(0.0, 10.0, 90.0),
            h(20.0, 30.0, 85.0),
            h(40.0, 50.0, 80.0),
            h(60.0, 70.0, 75.0),
            h(80.0, 90.0, 70.0),
            h(100.0, 110.0, 65.0),
        ];
        let reduced = reduce_highlights(candidates, 5);
        assert_eq!(reduced.len(), 5);
        // The lowest-scored candidate is the one cut.
        assert!(!reduced.iter().any(|x| x.score == Some(65.0)));
    }

    #[test]
    fn test_reduce_zero_cap() {
        assert!(reduce_highlights(vec![h(0.0, 10.0, 50.0)], 0).is_empty());
    }

    #[test]
    fn test_chunk_prompt_carries_range() {
        let prompt = build_chunk_prompt("some text", 330.0, 690.0);
        assert!(prompt.contains("[330.0s - 690.0s]"));
        assert!(prompt.contains("some text"));
        assert!(prompt.contains("3 to 5"));
    }
}
