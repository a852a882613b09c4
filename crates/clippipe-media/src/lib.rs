#![deny(unreachable_patterns)]
//! External media toolchain wrappers.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution with timeouts
//! - Precise clip cutting with optional burned-in subtitles
//! - Video download via yt-dlp
//! - Live-stream capture and segmentation
//! - SRT/VTT rendering and clip-local transcript projection
//! - Thumbnail extraction and ffprobe metadata

pub mod collector;
pub mod command;
pub mod cut;
pub mod download;
pub mod error;
pub mod probe;
pub mod subtitles;
pub mod thumbnail;

pub use collector::{collect_stream, concat_segments, CollectOutcome};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use cut::cut_clip;
pub use download::download_video;
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use subtitles::{clip_transcript, write_srt, write_vtt};
pub use thumbnail::extract_thumbnail;
