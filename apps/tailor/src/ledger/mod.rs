//! Status ledger: append-only, expiring per-job event log polled by clients.
//!
//! Events are stored by head insertion, so `read` returns them most-recent-first.
//! Use `read_chronological` when a consumer needs them in the order they happened.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::job::JobId;

pub mod memory;
pub mod redis;

pub use memory::InMemoryLedger;
pub use self::redis::RedisLedger;

/// One milestone per pipeline transition, plus the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    JobQueued,
    ScrappingJobLink,
    JobDescriptionScrapped,
    AnalyzingJd,
    JdAnalyzed,
    RankingProjects,
    ProjectsRanked,
    RankingSkills,
    SkillsRanked,
    GeneratingProjectDescription,
    ProjectDescriptionGenerated,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::JobQueued => "JOB_QUEUED",
            JobStatus::ScrappingJobLink => "SCRAPPING_JOB_LINK",
            JobStatus::JobDescriptionScrapped => "JOB_DESCRIPTION_SCRAPPED",
            JobStatus::AnalyzingJd => "ANALYZING_JD",
            JobStatus::JdAnalyzed => "JD_ANALYZED",
            JobStatus::RankingProjects => "RANKING_PROJECTS",
            JobStatus::ProjectsRanked => "PROJECTS_RANKED",
            JobStatus::RankingSkills => "RANKING_SKILLS",
            JobStatus::SkillsRanked => "SKILLS_RANKED",
            JobStatus::GeneratingProjectDescription => "GENERATING_PROJECT_DESCRIPTION",
            JobStatus::ProjectDescriptionGenerated => "PROJECT_DESCRIPTION_GENERATED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger entry. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: JobStatus,
    pub message: String,
    pub data: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(status: JobStatus, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status,
            message: message.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait StatusLedger: Send + Sync {
    /// Appends an event and refreshes the job's retention window.
    async fn append(&self, job_id: &JobId, event: StatusEvent) -> Result<(), LedgerError>;

    /// All events for a job, most recent first. Unknown or expired jobs yield
    /// an empty vector.
    async fn read(&self, job_id: &JobId) -> Result<Vec<StatusEvent>, LedgerError>;

    /// Drops the job's ledger before its retention window ends.
    async fn clear(&self, job_id: &JobId) -> Result<(), LedgerError>;

    /// All events for a job in the order they were appended.
    async fn read_chronological(&self, job_id: &JobId) -> Result<Vec<StatusEvent>, LedgerError> {
        let mut events = self.read(job_id).await?;
        events.reverse();
        Ok(events)
    }
}
