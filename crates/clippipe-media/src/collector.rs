//! Live-stream capture and segmentation.
//!
//! Captures a stream (HLS, RTMP/RTSP, or a platform page URL resolved through
//! yt-dlp) into fixed-duration mp4 segments via FFmpeg's segment muxer. The
//! segment files feed the fan-out: one transcribe sub-job per segment.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use crate::command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Timeout for resolving an indirect stream URL through yt-dlp.
const EXTRACT_TIMEOUT_SECS: u64 = 30;

/// Result of a stream capture.
#[derive(Debug, Clone)]
pub struct CollectOutcome {
    /// Produced segment files in deterministic (sorted) order
    pub segment_paths: Vec<PathBuf>,
    /// Duration of each segment as requested, seconds
    pub segment_duration: u64,
}

impl CollectOutcome {
    pub fn segment_count(&self) -> usize {
        self.segment_paths.len()
    }
}

/// Capture a stream into `output_dir/segment_NNN.mp4` files.
///
/// Capture runs for at most `max_duration` seconds and splits on
/// `segment_duration` boundaries without re-encoding. Producing zero segments
/// is an error; a short capture (fewer segments than `max/segment`) is not.
pub async fn collect_stream(
    stream_url: &str,
    output_dir: impl AsRef<Path>,
    segment_duration: u64,
    max_duration: u64,
) -> MediaResult<CollectOutcome> {
    let output_dir = output_dir.as_ref();
    check_ffmpeg()?;

    if !is_valid_stream_url(stream_url) {
        return Err(MediaError::InvalidStreamUrl(stream_url.to_string()));
    }

    info!(
        "Capturing stream {} for up to {}s in {}s segments",
        stream_url, max_duration, segment_duration
    );

    // Platform page URLs (YouTube Live, Twitch, ...) need the real HLS/DASH
    // URL extracted first; direct URLs and local files go straight to ffmpeg.
    let capture_url = if is_direct_stream(stream_url) {
        stream_url.to_string()
    } else {
        match resolve_stream_url(stream_url).await {
            Some(resolved) => resolved,
            None => {
                warn!("Stream URL extraction failed, trying the original URL");
                stream_url.to_string()
            }
        }
    };

    tokio::fs::create_dir_all(output_dir).await?;
    let output_pattern = output_dir.join("segment_%03d.mp4");

    let cmd = FfmpegCommand::from_strings(capture_url, output_pattern.to_string_lossy())
        .output_arg("-t")
        .output_arg(max_duration.to_string())
        .output_arg("-f")
        .output_arg("segment")
        .output_arg("-segment_time")
        .output_arg(segment_duration.to_string())
        .output_arg("-reset_timestamps")
        .output_arg("1")
        .output_arg("-c")
        .output_arg("copy")
        .output_arg("-avoid_negative_ts")
        .output_arg("make_zero");

    // Network stalls can hang the capture well past max_duration; bound it.
    FfmpegRunner::new()
        .with_timeout(max_duration + 120)
        .run(&cmd)
        .await?;

    let segment_paths = list_segments(output_dir).await?;
    if segment_paths.is_empty() {
        return Err(MediaError::NoSegments);
    }

    info!("Capture complete: {} segments", segment_paths.len());

    Ok(CollectOutcome {
        segment_paths,
        segment_duration,
    })
}

/// Concatenate captured segments into a single file without re-encoding.
///
/// Used by the in-process executor, which transcribes the merged capture
/// instead of fanning out per-segment sub-jobs.
pub async fn concat_segments(
    segment_paths: &[PathBuf],
    output_path: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let output_path = output_path.as_ref();
    check_ffmpeg()?;

    if segment_paths.is_empty() {
        return Err(MediaError::NoSegments);
    }

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let list_path = output_path.with_extension("concat.txt");
    let mut list_content = String::new();
    for path in segment_paths {
        list_content.push_str(&format!("file '{}'\n", path.display()));
    }
    tokio::fs::write(&list_path, list_content).await?;

    let cmd = FfmpegCommand::new(&list_path, output_path)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .output_arg("-c")
        .output_arg("copy");

    let result = FfmpegRunner::new().run(&cmd).await;
    tokio::fs::remove_file(&list_path).await.ok();
    result?;

    Ok(output_path.to_path_buf())
}

/// Accept http(s)/rtmp/rtsp URLs and existing local files.
fn is_valid_stream_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("rtmp://")
        || url.starts_with("rtsp://")
        || Path::new(url).exists()
}

/// Whether ffmpeg can open the URL directly, without yt-dlp extraction.
fn is_direct_stream(url: &str) -> bool {
    url.ends_with(".m3u8")
        || url.ends_with(".mp4")
        || url.ends_with(".mkv")
        || url.ends_with(".ts")
        || url.starts_with("rtmp://")
        || url.starts_with("rtsp://")
        || Path::new(url).exists()
}

/// Resolve a platform page URL to its HLS/DASH stream URL via yt-dlp.
async fn resolve_stream_url(url: &str) -> Option<String> {
    if check_ytdlp_quiet().is_none() {
        return None;
    }

    info!("Extracting stream URL from {}", url);

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(EXTRACT_TIMEOUT_SECS),
        Command::new("yt-dlp")
            .args(["-f", "best", "-g", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to run yt-dlp for stream extraction");
            return None;
        }
        Err(_) => {
            warn!("Stream URL extraction timed out");
            return None;
        }
    };

    if !output.status.success() {
        warn!(
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "Stream URL extraction failed"
        );
        return None;
    }

    let stream_url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stream_url.is_empty() {
        warn!("yt-dlp returned no stream URL");
        return None;
    }

    Some(stream_url)
}

fn check_ytdlp_quiet() -> Option<PathBuf> {
    which::which("yt-dlp").ok()
}

/// List produced `segment_*.mp4` files in sorted order.
async fn list_segments(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut segments = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("segment_") && name.ends_with(".mp4") {
            segments.push(entry.path());
        }
    }
    segments.sort();
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_stream_url("https://cdn/playlist.m3u8"));
        assert!(is_valid_stream_url("rtmp://host/app"));
        assert!(!is_valid_stream_url(""));
        assert!(!is_valid_stream_url("not a url"));
    }

    #[test]
    fn test_direct_stream_detection() {
        assert!(is_direct_stream("https://cdn/playlist.m3u8"));
        assert!(is_direct_stream("rtsp://cam/1"));
        assert!(is_direct_stream("https://cdn/file.ts"));
        assert!(!is_direct_stream("https://youtube.com/live/abc"));
    }

    #[tokio::test]
    async fn test_list_segments_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["segment_002.mp4", "segment_000.mp4", "segment_001.mp4", "other.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let segments = list_segments(dir.path()).await.unwrap();
        let names: Vec<_> = segments
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["segment_000.mp4", "segment_001.mp4", "segment_002.mp4"]);
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_list() {
        let err = concat_segments(&[], "/tmp/out.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::NoSegments));
    }
}
