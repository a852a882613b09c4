//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file or URL
    input: String,
    /// Output file or pattern
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::from_strings(
            input.as_ref().to_string_lossy(),
            output.as_ref().to_string_lossy(),
        )
    }

    /// Create a command whose input is a URL or whose output is a pattern
    /// rather than a plain path (stream capture uses both).
    pub fn from_strings(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input, for fast keyframe seek).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set encoder preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-vframes").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.clone());

        args.push(self.output.clone());

        args
    }
}

/// Runner for FFmpeg commands with an optional wall-clock timeout.
#[derive(Debug, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a wall-clock timeout; the process is killed on expiry.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let output_future = async {
            let mut stderr_buf = Vec::new();
            if let Some(mut stderr) = child.stderr.take() {
                use tokio::io::AsyncReadExt;
                stderr.read_to_end(&mut stderr_buf).await.ok();
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stderr_buf))
        };

        let (status, stderr_buf) = if let Some(timeout_secs) = self.timeout_secs {
            match tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                output_future,
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout_secs, "FFmpeg timed out, killing process");
                    let _ = child.kill().await;
                    return Err(MediaError::Timeout(timeout_secs));
                }
            }
        } else {
            output_future.await?
        };

        if status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&stderr_buf);
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(tail(&stderr, 2000)),
                status.code(),
            ))
        }
    }
}

/// Last `max` bytes of a string, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check if yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(30.0)
            .video_codec("libx264")
            .crf(23);

        let args = cmd.build_args();
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        // -ss comes before -i for fast seek; -t after.
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < i && i < t);
    }

    #[test]
    fn test_output_is_last_arg() {
        let cmd = FfmpegCommand::from_strings("https://cdn/stream.m3u8", "seg_%03d.mp4")
            .output_arg("-f")
            .output_arg("segment");
        let args = cmd.build_args();
        assert_eq!(args.last().unwrap(), "seg_%03d.mp4");
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        let s = "aééé";
        let t = tail(s, 3);
        assert!(t.chars().count() <= 3);
        assert!(s.ends_with(&t));
    }
}
