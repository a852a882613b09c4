//! Clip cutting.
//!
//! Cuts are re-encoded rather than stream-copied: a copy cut can only start
//! on a keyframe, which drifts audio against video for arbitrary highlight
//! boundaries.

use std::path::Path;
use tracing::info;

use clippipe_models::SubtitleStyle;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

const CLIP_VIDEO_CODEC: &str = "libx264";
const CLIP_AUDIO_CODEC: &str = "aac";
const CLIP_PRESET: &str = "fast";
const CLIP_CRF: u8 = 23;
const CLIP_AUDIO_BITRATE: &str = "128k";

/// Cut one clip out of a source video.
///
/// Seeks to `start` and encodes `duration` seconds into `output`. When a
/// subtitle file is supplied it is burned in through the `subtitles` filter
/// with the given style.
pub async fn cut_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    duration: f64,
    subtitle: Option<(&Path, &SubtitleStyle)>,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if duration <= 0.0 {
        return Err(MediaError::InvalidVideo(format!(
            "non-positive clip duration: {duration}"
        )));
    }

    info!(
        "Cutting clip: {} -> {} ({:.1}s + {:.1}s, subtitles: {})",
        input.display(),
        output.display(),
        start,
        duration,
        subtitle.is_some(),
    );

    let mut cmd = FfmpegCommand::new(input, output)
        .seek(start.max(0.0))
        .duration(duration)
        .video_codec(CLIP_VIDEO_CODEC)
        .preset(CLIP_PRESET)
        .crf(CLIP_CRF)
        .audio_codec(CLIP_AUDIO_CODEC)
        .audio_bitrate(CLIP_AUDIO_BITRATE);

    if let Some((subtitle_path, style)) = subtitle {
        cmd = cmd.video_filter(subtitle_filter(subtitle_path, style));
    }

    FfmpegRunner::new().run(&cmd).await
}

/// Build the burn-in filter expression for a subtitle file.
fn subtitle_filter(subtitle_path: &Path, style: &SubtitleStyle) -> String {
    format!(
        "subtitles={}:force_style='{}'",
        escape_filter_path(&subtitle_path.to_string_lossy()),
        style.force_style()
    )
}

/// Escape a path for use inside an ffmpeg filter expression.
///
/// `:` separates filter options and `'` delimits strings, so both need
/// escaping. Windows drive letters are the usual victim.
fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_filter_expression() {
        let style = SubtitleStyle::default();
        let filter = subtitle_filter(Path::new("/tmp/clip.srt"), &style);
        assert!(filter.starts_with("subtitles=/tmp/clip.srt:force_style='"));
        assert!(filter.contains("FontName=Arial"));
        assert!(filter.contains("MarginV=40"));
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("C:/subs.srt"), "C\\:/subs.srt");
        assert_eq!(escape_filter_path("a'b.srt"), "a\\'b.srt");
    }

    #[tokio::test]
    async fn test_cut_rejects_missing_input() {
        let err = cut_clip("/nonexistent/v.mp4", "/tmp/out.mp4", 0.0, 5.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
