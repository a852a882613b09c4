//! Missing-artifact recovery.
//!
//! Stages hand artifacts to each other by path over the broker. A message can
//! arrive before a slow filesystem settles, or carry a path written by a
//! worker with a different mount layout. Policy: short fixed-backoff retries,
//! then a basename search under the data root, then give up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{WorkerError, WorkerResult};

/// Retry attempts before the basename search.
const RESOLVE_RETRIES: u32 = 3;

/// Fixed delay between retries.
const RESOLVE_DELAY: Duration = Duration::from_secs(1);

/// Resolve an artifact path, waiting briefly and then searching by basename.
///
/// Returns the original path when it appears, a relocated path when the
/// basename search finds one under `data_dir`, or `MissingArtifact`.
pub async fn resolve_artifact(path: &Path, data_dir: &Path) -> WorkerResult<PathBuf> {
    for attempt in 1..=RESOLVE_RETRIES {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        warn!(
            path = %path.display(),
            attempt,
            retries = RESOLVE_RETRIES,
            "Artifact not found yet, waiting"
        );
        tokio::time::sleep(RESOLVE_DELAY).await;
    }

    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let Some(basename) = path.file_name() else {
        return Err(WorkerError::MissingArtifact(path.to_path_buf()));
    };

    warn!(
        path = %path.display(),
        "Artifact still missing, searching by basename under {}",
        data_dir.display()
    );

    if let Some(found) = find_by_basename(data_dir, basename).await {
        info!(found = %found.display(), "Located equivalent artifact");
        return Ok(found);
    }

    Err(WorkerError::MissingArtifact(path.to_path_buf()))
}

/// Breadth-first search for a file with the given basename.
async fn find_by_basename(root: &Path, basename: &std::ffi::OsStr) -> Option<PathBuf> {
    let mut queue = vec![root.to_path_buf()];

    while let Some(dir) = queue.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => queue.push(path),
                Ok(ft) if ft.is_file() && entry.file_name() == basename => return Some(path),
                _ => {}
            }
        }
    }

    None
}
