//! Stream collector worker binary.

use tracing::error;

use clippipe_worker::{init_process, workers, WorkerContext};

#[tokio::main]
async fn main() {
    init_process("collector-worker");

    let ctx = match WorkerContext::init().await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to initialize worker context: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = workers::collect::run(&ctx).await {
        error!("Collector worker stopped: {e}");
        std::process::exit(1);
    }
}
