use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use super::store::JobStore;
use crate::pipeline::ProcessingPipeline;

/// Concurrent consumers of the job channel.
///
/// All workers share one receiver behind a mutex; claiming the next id takes
/// the lock, so no two workers ever see the same job, while processing runs
/// outside the lock at full concurrency. A job gets exactly one attempt —
/// failures are recorded, never retried.
pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn(
        concurrency: usize,
        rx: mpsc::UnboundedReceiver<Uuid>,
        store: Arc<JobStore>,
        pipeline: Arc<ProcessingPipeline>,
    ) -> Vec<JoinHandle<()>> {
        let rx = Arc::new(Mutex::new(rx));
        (0..concurrency.max(1))
            .map(|slot| {
                tokio::spawn(worker_loop(
                    slot,
                    Arc::clone(&rx),
                    Arc::clone(&store),
                    Arc::clone(&pipeline),
                ))
            })
            .collect()
    }
}

async fn worker_loop(
    slot: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Uuid>>>,
    store: Arc<JobStore>,
    pipeline: Arc<ProcessingPipeline>,
) {
    info!(slot, "Worker started");

    loop {
        let id = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(id) = id else { break };

        let Some(payload) = store.claim(id).await else {
            // Purged before a worker got to it, or claimed state was off.
            continue;
        };

        info!(slot, job_id = %id, "Processing job");

        match pipeline.run(&payload).await {
            Ok(result) => {
                store.complete(id, result).await;
                info!(slot, job_id = %id, "Job completed");
            }
            Err(e) => {
                error!(slot, job_id = %id, error = %e, "Job failed");
                store.fail(id, e.to_string()).await;
            }
        }
    }

    info!(slot, "Worker stopped: queue closed");
}
