//! Worker configuration.

use std::path::PathBuf;

/// Tuning knobs for the chunked analysis path.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target duration of one transcript chunk, seconds
    pub chunk_duration_secs: f64,
    /// Overlap carried between consecutive chunks, seconds
    pub overlap_secs: f64,
    /// Transcripts longer than this (in characters) take the chunked path
    pub direct_threshold_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: 360.0,
            overlap_secs: 30.0,
            direct_threshold_chars: 20_000,
        }
    }
}

impl ChunkingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_duration_secs: env_parse("CHUNK_DURATION_SECS", defaults.chunk_duration_secs),
            overlap_secs: env_parse("CHUNK_OVERLAP_SECS", defaults.overlap_secs),
            direct_threshold_chars: env_parse(
                "CHUNK_THRESHOLD_CHARS",
                defaults.direct_threshold_chars,
            ),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the shared per-job artifact tree
    pub data_dir: PathBuf,
    /// Skip highlights with `end <= start` instead of applying the +5s fallback
    pub strict_edit_timestamps: bool,
    /// Chunked-analysis tuning
    pub chunking: ChunkingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/app/data/jobs"),
            strict_edit_timestamps: false,
            chunking: ChunkingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("CLIPPIPE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/app/data/jobs")),
            strict_edit_timestamps: std::env::var("EDIT_STRICT_TIMESTAMPS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            chunking: ChunkingConfig::from_env(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_duration_secs, 360.0);
        assert_eq!(config.overlap_secs, 30.0);
        assert_eq!(config.direct_threshold_chars, 20_000);
    }

    #[test]
    fn test_worker_defaults() {
        let config = WorkerConfig::default();
        assert!(!config.strict_edit_timestamps);
        assert_eq!(config.data_dir, PathBuf::from("/app/data/jobs"));
    }
}
