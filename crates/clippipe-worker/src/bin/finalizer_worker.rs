//! Finalizer worker binary (stream fan-in).

use tracing::error;

use clippipe_worker::{init_process, workers, WorkerContext};

#[tokio::main]
async fn main() {
    init_process("finalizer-worker");

    let ctx = match WorkerContext::init().await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to initialize worker context: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = workers::finalize::run(&ctx).await {
        error!("Finalizer worker stopped: {e}");
        std::process::exit(1);
    }
}
