//! Video download using yt-dlp.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::check_ytdlp;
use crate::error::{MediaError, MediaResult};

/// Preferred download format: mp4 video + m4a audio, falling back to the best
/// single mp4, then to whatever the host serves.
const PREFERRED_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Wall-clock bound on one download.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Download a video from a URL to a local file.
///
/// Bounded by a 10-minute wall clock; yt-dlp itself retries fragments and
/// whole downloads up to 10 times before giving up.
pub async fn download_video(url: &str, output_path: impl AsRef<Path>) -> MediaResult<()> {
    let output_path = output_path.as_ref();
    check_ytdlp()?;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    info!("Downloading video from {} to {}", url, output_path.display());

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        Command::new("yt-dlp")
            .args(["-f", PREFERRED_FORMAT, "--no-playlist"])
            .args(["--retries", "10", "--fragment-retries", "10"])
            .arg("-o")
            .arg(output_path)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output(),
    )
    .await;

    let output = match result {
        Ok(output) => output?,
        Err(_) => return Err(MediaError::Timeout(DOWNLOAD_TIMEOUT_SECS)),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {}", stderr);
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            stderr.lines().last().unwrap_or("Unknown error")
        )));
    }

    if !output_path.exists() {
        return Err(MediaError::download_failed("Output file not created"));
    }

    let file_size = output_path.metadata()?.len();
    if file_size == 0 {
        return Err(MediaError::download_failed("Output file is empty"));
    }

    info!(
        "Downloaded video: {} ({:.1} MB)",
        output_path.display(),
        file_size as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}
