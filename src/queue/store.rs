use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::job::{JobPayload, JobRecord, JobSnapshot, JobState, RetentionPolicy};
use crate::pipeline::WorkResult;

/// Job records keyed by id, the single shared mutation point between the
/// router and the worker pool. State transitions serialize through the write
/// lock, and a terminal state is written at most once per job.
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
    retention: RetentionPolicy,
}

impl JobStore {
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub async fn insert(&self, record: JobRecord) {
        self.jobs.write().await.insert(record.id, record);
    }

    /// Mark the job active and hand its payload to the claiming worker.
    /// Returns None when the job is gone (purged) or not claimable.
    pub async fn claim(&self, id: Uuid) -> Option<JobPayload> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id)?;
        if record.state != JobState::Waiting {
            warn!(job_id = %id, state = %record.state, "Job not claimable");
            return None;
        }
        record.state = JobState::Active;
        record.attempts += 1;
        Some(record.payload.clone())
    }

    pub async fn complete(&self, id: Uuid, result: WorkResult) {
        self.finish(id, JobState::Completed, Some(result), None).await;
    }

    pub async fn fail(&self, id: Uuid, error: String) {
        self.finish(id, JobState::Failed, None, Some(error)).await;
    }

    async fn finish(
        &self,
        id: Uuid,
        state: JobState,
        result: Option<WorkResult>,
        error: Option<String>,
    ) {
        let mut jobs = self.jobs.write().await;
        let Some(record) = jobs.get_mut(&id) else {
            warn!(job_id = %id, "Terminal transition for unknown job");
            return;
        };
        if record.state.is_terminal() {
            warn!(job_id = %id, state = %record.state, "Job already terminal, ignoring transition");
            return;
        }
        record.state = state;
        record.result = result;
        record.error = error;
        record.finished_at = Some(Utc::now());
    }

    pub async fn state(&self, id: Uuid) -> Option<JobState> {
        self.jobs.read().await.get(&id).map(|r| r.state)
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<JobSnapshot> {
        self.jobs.read().await.get(&id).map(|r| JobSnapshot {
            id: r.id,
            state: r.state,
            result: r.result.clone(),
        })
    }

    /// Drop terminal records that fell out of the retention window:
    /// completed jobs by age and count, failed jobs by a longer age.
    /// Returns how many records were purged.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|_, r| match (r.state, r.finished_at) {
            (JobState::Completed, Some(done)) => now - done <= self.retention.completed_max_age,
            (JobState::Failed, Some(done)) => now - done <= self.retention.failed_max_age,
            _ => true,
        });

        // Enforce the completed-count cap, newest first.
        let mut completed: Vec<(Uuid, DateTime<Utc>)> = jobs
            .values()
            .filter(|r| r.state == JobState::Completed)
            .filter_map(|r| r.finished_at.map(|t| (r.id, t)))
            .collect();
        if completed.len() > self.retention.completed_max_count {
            completed.sort_by_key(|&(_, t)| std::cmp::Reverse(t));
            for (id, _) in completed.drain(self.retention.completed_max_count..) {
                jobs.remove(&id);
            }
        }

        before - jobs.len()
    }
}

/// Periodically purge expired terminal jobs.
pub fn spawn_retention_sweeper(store: Arc<JobStore>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired(Utc::now()).await;
            if purged > 0 {
                debug!(purged, "Purged expired jobs");
            }
        }
    })
}
