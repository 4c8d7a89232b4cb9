use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::WorkResult;

/// What a job works on. At least one field must be present; an audio path
/// and a transcript may both be set (the audio's text is appended).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPayload {
    pub transcript: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub audio_url: Option<String>,
}

impl JobPayload {
    pub fn is_empty(&self) -> bool {
        self.transcript.is_none() && self.audio_path.is_none() && self.audio_url.is_none()
    }
}

/// Externally observable job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub payload: JobPayload,
    pub state: JobState,
    pub result: Option<WorkResult>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            state: JobState::Waiting,
            result: None,
            error: None,
            attempts: 0,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// What a result query returns: state always, result only once completed.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub state: JobState,
    pub result: Option<WorkResult>,
}

/// Retention window for terminal jobs.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub completed_max_age: Duration,
    pub completed_max_count: usize,
    pub failed_max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age: Duration::seconds(3600),
            completed_max_count: 1000,
            failed_max_age: Duration::seconds(86_400),
        }
    }
}
