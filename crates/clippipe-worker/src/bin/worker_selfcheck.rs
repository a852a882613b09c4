//! Deployment self-check: verifies the toolchain and environment a worker
//! needs before it is put on a queue.

use std::path::Path;

use clippipe_media::{check_ffmpeg, check_ffprobe, check_ytdlp};
use clippipe_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with data_dir={}",
        config.data_dir.display()
    );

    ensure_data_dir(&config.data_dir).await?;

    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg check failed: {e}"))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe check failed: {e}"))?;
    check_ytdlp().map_err(|e| anyhow::anyhow!("yt-dlp check failed: {e}"))?;

    ensure_env_present(&["RABBITMQ_URL", "REDIS_URL", "GEMINI_API_KEY"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_data_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;

    // Creating a directory is not enough on a read-only mount; prove a write.
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
