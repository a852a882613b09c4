//! Clip production from a highlight list.
//!
//! Each highlight becomes one cut of the source video, numbered in input
//! order. A failure on one highlight is logged and skipped; the stage fails
//! only when zero clips succeed.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use clippipe_media::{clip_transcript, cut_clip, extract_thumbnail, write_srt, write_vtt};
use clippipe_models::{Highlight, SubtitleStyle, Transcript};

use crate::error::{WorkerError, WorkerResult};

/// Fallback clip length when a highlight arrives with `end <= start`.
pub const DEFAULT_FALLBACK_SECONDS: f64 = 5.0;

/// Editor options.
#[derive(Debug, Clone, Default)]
pub struct EditOptions {
    /// Burn subtitles into every clip (needs a transcript)
    pub include_subtitles: bool,
    /// Style for burned-in subtitles
    pub subtitle_style: SubtitleStyle,
    /// Skip invalid-interval highlights instead of applying the fallback
    pub strict_timestamps: bool,
}

/// Cut one clip per highlight into `clips_dir`.
///
/// Returns the produced clip paths in highlight order. Fails only when no
/// highlight could be cut.
pub async fn edit_highlights(
    video_path: &Path,
    highlights: &[Highlight],
    clips_dir: &Path,
    transcript: Option<&Transcript>,
    options: &EditOptions,
) -> WorkerResult<Vec<PathBuf>> {
    if highlights.is_empty() {
        return Err(WorkerError::job_failed("no highlights to edit"));
    }

    tokio::fs::create_dir_all(clips_dir).await?;

    info!(
        video = %video_path.display(),
        count = highlights.len(),
        subtitles = options.include_subtitles,
        "Editing highlights"
    );

    let with_subs = options.include_subtitles && transcript.is_some();
    let mut clips = Vec::new();

    for (i, highlight) in highlights.iter().enumerate() {
        let index = i + 1;

        let Some((start, end, fell_back)) = resolve_bounds(highlight, options.strict_timestamps)
        else {
            warn!(
                index,
                start = highlight.start,
                end = highlight.end,
                "Skipping highlight with invalid interval (strict mode)"
            );
            continue;
        };
        if fell_back {
            warn!(
                index,
                start = highlight.start,
                end = highlight.end,
                fallback_end = end,
                "Highlight interval invalid, applying {}s fallback",
                DEFAULT_FALLBACK_SECONDS
            );
        }

        let duration = end - start;
        let filename = clip_filename(index, start, duration, with_subs);
        let output_path = clips_dir.join(&filename);

        // Subtitle cues are rendered per clip into a temporary SRT that is
        // burned in by the cutter and then removed.
        let mut temp_srt = None;
        if with_subs {
            if let Some(transcript) = transcript {
                let segments = clip_transcript(transcript, start, end);
                if !segments.is_empty() {
                    let srt_path = clips_dir.join(format!("clip_{index:02}.tmp.srt"));
                    match write_srt(&segments, &srt_path).await {
                        Ok(()) => temp_srt = Some(srt_path),
                        Err(e) => {
                            warn!(index, error = %e, "Subtitle rendering failed, cutting without subtitles");
                        }
                    }
                }
            }
        }

        let subtitle = temp_srt
            .as_deref()
            .map(|path| (path, &options.subtitle_style));

        let result = cut_clip(video_path, &output_path, start, duration, subtitle).await;

        if let Some(srt_path) = &temp_srt {
            tokio::fs::remove_file(srt_path).await.ok();
        }

        match result {
            Ok(()) => {
                info!(index, clip = %output_path.display(), "Clip produced");
                clips.push(output_path);
            }
            Err(e) => {
                warn!(index, error = %e, "Clip production failed, skipping highlight");
            }
        }
    }

    if clips.is_empty() {
        return Err(WorkerError::job_failed("no clips were produced"));
    }

    info!(
        produced = clips.len(),
        requested = highlights.len(),
        "Editing complete"
    );
    Ok(clips)
}

/// Advisory sibling artifacts for the first clip: a standalone `.srt`, a
/// `.vtt`, and a middle-frame `_thumb.jpg`.
///
/// Best-effort by contract: any failure is logged and the clip stands.
/// Returns the thumbnail path when one was produced.
pub async fn emit_first_clip_extras(
    video_path: &Path,
    transcript: Option<&Transcript>,
    highlights: &[Highlight],
    clips: &[PathBuf],
) -> Option<PathBuf> {
    let (Some(first_highlight), Some(first_clip)) = (highlights.first(), clips.first()) else {
        return None;
    };

    let (start, end, _) = resolve_bounds(first_highlight, false)?;

    if let Some(transcript) = transcript {
        let segments = clip_transcript(transcript, start, end);
        if !segments.is_empty() {
            let srt_path = first_clip.with_extension("srt");
            if let Err(e) = write_srt(&segments, &srt_path).await {
                warn!(error = %e, "First-clip SRT emission failed");
            }
            let vtt_path = first_clip.with_extension("vtt");
            if let Err(e) = write_vtt(&segments, &vtt_path).await {
                warn!(error = %e, "First-clip VTT emission failed");
            }
        }
    }

    let thumb_path = thumbnail_path(first_clip);
    match extract_thumbnail(video_path, start, end, &thumb_path).await {
        Ok(()) => Some(thumb_path),
        Err(e) => {
            warn!(error = %e, "First-clip thumbnail extraction failed");
            None
        }
    }
}

/// `<clip stem>_thumb.jpg` next to the clip.
fn thumbnail_path(clip: &Path) -> PathBuf {
    let stem = clip
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip".to_string());
    clip.with_file_name(format!("{stem}_thumb.jpg"))
}

/// Resolve a highlight's cut bounds.
///
/// Coerces the interval, applies the `end <= start` fallback (or skips in
/// strict mode), and clamps the start to zero. Returns
/// `(start, end, fallback_applied)`.
pub fn resolve_bounds(highlight: &Highlight, strict: bool) -> Option<(f64, f64, bool)> {
    let mut start = highlight.start;
    let mut end = highlight.end;
    let mut fell_back = false;

    if end <= start {
        if strict {
            return None;
        }
        end = start + DEFAULT_FALLBACK_SECONDS;
        fell_back = true;
    }

    if start < 0.0 {
        start = 0.0;
        if end <= start {
            if strict {
                return None;
            }
            end = start + DEFAULT_FALLBACK_SECONDS;
            fell_back = true;
        }
    }

    Some((start, end, fell_back))
}

/// Output filename: `clip_NN_inicio_<S>s_duracao_<D>s[_with_subs].mp4`.
pub fn clip_filename(index: usize, start: f64, duration: f64, with_subs: bool) -> String {
    let suffix = if with_subs { "_with_subs" } else { "" };
    format!(
        "clip_{:02}_inicio_{}s_duracao_{}s{}.mp4",
        index, start as i64, duration as i64, suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_filename_format() {
        assert_eq!(
            clip_filename(1, 93.7, 45.2, false),
            "clip_01_inicio_93s_duracao_45s.mp4"
        );
        assert_eq!(
            clip_filename(12, 0.0, 5.0, true),
            "clip_12_inicio_0s_duracao_5s_with_subs.mp4"
        );
    }

    #[test]
    fn test_resolve_bounds_fallback() {
        // end == start rewrites to a 5s clip.
        let (start, end, fell_back) = resolve_bounds(&Highlight::new(10.0, 10.0), false).unwrap();
        assert_eq!(start, 10.0);
        assert_eq!(end, 15.0);
        assert!(fell_back);

        // end < start gets the same treatment.
        let (_, end, fell_back) = resolve_bounds(&Highlight::new(10.0, 3.0), false).unwrap();
        assert_eq!(end, 15.0);
        assert!(fell_back);
    }

    #[test]
    fn test_resolve_bounds_strict_skips() {
        assert!(resolve_bounds(&Highlight::new(10.0, 10.0), true).is_none());
        assert!(resolve_bounds(&Highlight::new(10.0, 3.0), true).is_none());
        assert!(resolve_bounds(&Highlight::new(10.0, 20.0), true).is_some());
    }

    #[test]
    fn test_resolve_bounds_clamps_negative_start() {
        let (start, end, _) = resolve_bounds(&Highlight::new(-2.0, 8.0), false).unwrap();
        assert_eq!(start, 0.0);
        assert_eq!(end, 8.0);
    }

    #[test]
    fn test_resolve_bounds_valid_passthrough() {
        let (start, end, fell_back) = resolve_bounds(&Highlight::new(5.0, 25.0), false).unwrap();
        assert_eq!((start, end), (5.0, 25.0));
        assert!(!fell_back);
    }

    #[test]
    fn test_thumbnail_path() {
        assert_eq!(
            thumbnail_path(Path::new("/x/clips/clip_01_inicio_0s_duracao_5s.mp4")),
            Path::new("/x/clips/clip_01_inicio_0s_duracao_5s_thumb.jpg")
        );
    }

    #[tokio::test]
    async fn test_edit_rejects_empty_highlight_list() {
        let err = edit_highlights(
            Path::new("/tmp/v.mp4"),
            &[],
            Path::new("/tmp/clips"),
            None,
            &EditOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, WorkerError::JobFailed(_)));
    }
}
