//! Job queue and worker pool
//!
//! Decouples request acceptance from processing. `JobQueue::submit` records
//! the job and returns immediately; `WorkerPool` consumers claim ids one at a
//! time and drive the shared pipeline to a single terminal state per job.
//! Completed jobs are purged on a bounded age/count window, failed jobs are
//! kept longer for diagnosis.

mod job;
mod queue;
mod store;
mod worker;

pub use job::{JobPayload, JobRecord, JobSnapshot, JobState, RetentionPolicy};
pub use queue::JobQueue;
pub use store::{spawn_retention_sweeper, JobStore};
pub use worker::WorkerPool;
