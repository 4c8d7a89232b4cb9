//! Request routing strategy
//!
//! One `WorkDispatcher` is selected at startup from configuration; endpoints
//! only see the trait. Inline runs the pipeline inside the request and
//! returns the finished result; queued stages the upload, hands ownership to
//! the job, and returns a handle.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{ProcessingPipeline, WorkResult};
use crate::queue::{JobPayload, JobQueue};
use crate::temp::TempStore;

/// One inbound unit of work, as the endpoints see it.
#[derive(Debug, Default)]
pub struct WorkOrder {
    pub transcript: Option<String>,
    pub upload: Option<Upload>,
    pub audio_url: Option<String>,
}

#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Completed(WorkResult),
    Queued { job_id: Uuid },
}

#[async_trait]
pub trait WorkDispatcher: Send + Sync {
    async fn dispatch(&self, order: WorkOrder) -> Result<DispatchOutcome, PipelineError>;
}

/// Runs the pipeline within the request's lifetime. Temp files staged for
/// the upload are adopted by the pipeline and released before this returns.
pub struct InlineDispatcher {
    pipeline: Arc<ProcessingPipeline>,
    temp: Arc<TempStore>,
}

impl InlineDispatcher {
    pub fn new(pipeline: Arc<ProcessingPipeline>, temp: Arc<TempStore>) -> Self {
        Self { pipeline, temp }
    }
}

#[async_trait]
impl WorkDispatcher for InlineDispatcher {
    async fn dispatch(&self, order: WorkOrder) -> Result<DispatchOutcome, PipelineError> {
        let payload = stage_order(order, &self.temp)?;
        let result = self.pipeline.run(&payload).await?;
        Ok(DispatchOutcome::Completed(result))
    }
}

/// Submits a job and returns immediately. The staged upload now belongs to
/// the job; the worker that claims it releases the file.
pub struct QueuedDispatcher {
    queue: Arc<JobQueue>,
    temp: Arc<TempStore>,
}

impl QueuedDispatcher {
    pub fn new(queue: Arc<JobQueue>, temp: Arc<TempStore>) -> Self {
        Self { queue, temp }
    }
}

#[async_trait]
impl WorkDispatcher for QueuedDispatcher {
    async fn dispatch(&self, order: WorkOrder) -> Result<DispatchOutcome, PipelineError> {
        let payload = stage_order(order, &self.temp)?;
        let staged_path = payload.audio_path.clone();

        match self.queue.submit(payload).await {
            Ok(job_id) => Ok(DispatchOutcome::Queued { job_id }),
            Err(e) => {
                // The job will never run, so no worker can release the
                // staged file; take ownership back and drop it.
                if let Some(path) = staged_path {
                    drop(crate::temp::TempGuard::adopt(path));
                }
                Err(e)
            }
        }
    }
}

/// Stage an uploaded file to disk and build the job payload. Ownership of
/// the staged path transfers into the payload here; whichever unit of work
/// runs the payload adopts and releases it.
fn stage_order(order: WorkOrder, temp: &TempStore) -> Result<JobPayload, PipelineError> {
    let mut payload = JobPayload {
        transcript: order.transcript,
        audio_path: None,
        audio_url: order.audio_url,
    };

    if let Some(upload) = order.upload {
        let ext = Path::new(&upload.filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let guard = temp.stage("upload", ext, &upload.bytes)?;
        debug!(filename = %upload.filename, path = %guard.path().display(), "Upload staged");
        payload.audio_path = Some(guard.into_path());
    }

    if payload.is_empty() {
        return Err(PipelineError::Validation(
            "nothing to process: no transcript, audio, or url".to_string(),
        ));
    }

    Ok(payload)
}
