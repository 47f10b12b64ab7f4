//! Job queue substrate shared by stage producers and stage workers.
//!
//! Retry lives here and only here: a job whose handler reports an
//! infrastructure failure is re-scheduled with exponential backoff until its
//! attempts run out, after which it is parked in the failed set for inspection.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod memory;
pub mod policy;
pub mod producer;
pub mod redis;
pub mod worker;

pub use memory::InMemoryQueue;
pub use policy::JobOptions;
pub use producer::StageProducer;
pub use self::redis::RedisQueue;
pub use worker::StageWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Delayed => "delayed",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "delayed" => Ok(JobState::Delayed),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            _ => Err(format!("Invalid job state: {}", s)),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job as the queue sees it: opaque payload plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedJob {
    pub id: String,
    pub queue: String,
    pub payload: Value,
    pub opts: JobOptions,
    pub attempts_made: u32,
    pub state: JobState,
    pub failed_reason: Option<String>,
    pub return_value: Option<Value>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub delayed: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job {id} not found in queue {queue}")]
    UnknownJob { queue: String, id: String },

    #[error("Corrupt job record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Adds a job to the tail of the queue and returns its queue-assigned id.
    async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        opts: JobOptions,
    ) -> Result<String, QueueError>;

    /// Takes the next ready job, promoting delayed jobs whose backoff elapsed.
    /// Each job is handed to exactly one caller.
    async fn reserve(&self, queue: &str) -> Result<Option<QueuedJob>, QueueError>;

    /// Marks an active job completed and prunes completed jobs per its options.
    async fn complete(&self, queue: &str, job_id: &str, return_value: Value)
        -> Result<(), QueueError>;

    /// Records a failed attempt. Returns `Delayed` when another attempt is
    /// scheduled, `Failed` once attempts are exhausted.
    async fn fail(&self, queue: &str, job_id: &str, reason: &str) -> Result<JobState, QueueError>;

    async fn get_job(&self, queue: &str, job_id: &str) -> Result<Option<QueuedJob>, QueueError>;

    async fn counts(&self, queue: &str) -> Result<JobCounts, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_round_trips_through_str() {
        for state in [
            JobState::Waiting,
            JobState::Delayed,
            JobState::Active,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("stalled".parse::<JobState>().is_err());
    }
}
