//! Thumbnail extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Width the thumbnail is scaled down to (height keeps aspect).
const THUMBNAIL_SCALE_WIDTH: u32 = 480;

/// Extract a thumbnail for a highlight: the frame at the middle of
/// `[start, end]` in the source video.
pub async fn extract_thumbnail(
    source: impl AsRef<Path>,
    start: f64,
    end: f64,
    output_path: impl AsRef<Path>,
) -> MediaResult<()> {
    let midpoint = midpoint(start, end);

    let cmd = FfmpegCommand::new(source.as_ref(), output_path.as_ref())
        .seek(midpoint)
        .single_frame()
        .video_filter(format!(
            "scale={}:-2:force_original_aspect_ratio=decrease",
            THUMBNAIL_SCALE_WIDTH
        ));

    FfmpegRunner::new().run(&cmd).await
}

fn midpoint(start: f64, end: f64) -> f64 {
    let duration = (end - start).max(0.0);
    start + duration / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(10.0, 20.0), 15.0);
        assert_eq!(midpoint(10.0, 10.0), 10.0);
        // Inverted ranges do not seek before the start.
        assert_eq!(midpoint(10.0, 5.0), 10.0);
    }
}
