//! Per-job artifact layout on the shared filesystem.
//!
//! Every artifact of a job lives under `<DATA>/<job_id>/`. The per-job
//! directory is the isolation unit: two workers never write into the same
//! job directory concurrently because at most one worker holds the broker
//! delivery for a given stage of a given job.

use std::path::{Path, PathBuf};

use crate::job::JobId;

/// Resolved artifact paths for one job.
#[derive(Debug, Clone)]
pub struct JobPaths {
    root: PathBuf,
}

impl JobPaths {
    /// Layout rooted at `<data_dir>/<job_id>/`.
    pub fn new(data_dir: impl AsRef<Path>, job_id: &JobId) -> Self {
        Self {
            root: data_dir.as_ref().join(job_id.as_str()),
        }
    }

    /// The job's directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The source media once materialized locally.
    pub fn temp_video(&self) -> PathBuf {
        self.root.join("temp_video.mp4")
    }

    /// Directory of captured stream segments.
    pub fn segments_dir(&self) -> PathBuf {
        self.root.join("segments")
    }

    /// The `index`-th captured segment.
    pub fn segment(&self, index: usize) -> PathBuf {
        self.segments_dir().join(format!("segment_{:03}.mp4", index))
    }

    /// The transcript JSON.
    pub fn transcription(&self) -> PathBuf {
        self.root.join("transcription.json")
    }

    /// The analyst's output JSON.
    pub fn highlights(&self) -> PathBuf {
        self.root.join("highlights.json")
    }

    /// Directory of emitted clips.
    pub fn clips_dir(&self) -> PathBuf {
        self.root.join("clips")
    }

    /// Optional log directory.
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let paths = JobPaths::new("/data", &JobId::from("job42"));
        assert_eq!(paths.root(), Path::new("/data/job42"));
        assert_eq!(paths.temp_video(), Path::new("/data/job42/temp_video.mp4"));
        assert_eq!(
            paths.segment(3),
            Path::new("/data/job42/segments/segment_003.mp4")
        );
        assert_eq!(
            paths.transcription(),
            Path::new("/data/job42/transcription.json")
        );
        assert_eq!(paths.highlights(), Path::new("/data/job42/highlights.json"));
        assert_eq!(paths.clips_dir(), Path::new("/data/job42/clips"));
    }
}
