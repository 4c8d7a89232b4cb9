use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use super::job::{JobPayload, JobRecord, JobSnapshot, JobState};
use super::store::JobStore;
use crate::error::PipelineError;

/// Submission front of the queue. Recording the job and handing its id to
/// the worker channel is all that happens here; execution never blocks a
/// submitter. The channel is unbounded for that reason.
pub struct JobQueue {
    store: Arc<JobStore>,
    tx: mpsc::UnboundedSender<Uuid>,
}

impl JobQueue {
    pub fn new(store: Arc<JobStore>) -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { store, tx }, rx)
    }

    pub async fn submit(&self, payload: JobPayload) -> Result<Uuid, PipelineError> {
        if payload.is_empty() {
            return Err(PipelineError::Validation(
                "payload needs a transcript, an audio file, or an audio url".to_string(),
            ));
        }

        let record = JobRecord::new(payload);
        let id = record.id;
        self.store.insert(record).await;

        if self.tx.send(id).is_err() {
            // Workers are gone; the job would wait forever.
            self.store
                .fail(id, "worker pool unavailable".to_string())
                .await;
            return Err(PipelineError::Queue("worker pool unavailable".to_string()));
        }

        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    pub async fn query_state(&self, id: Uuid) -> Option<JobState> {
        self.store.state(id).await
    }

    pub async fn fetch_result(&self, id: Uuid) -> Option<JobSnapshot> {
        self.store.snapshot(id).await
    }

    pub fn store(&self) -> Arc<JobStore> {
        Arc::clone(&self.store)
    }
}
