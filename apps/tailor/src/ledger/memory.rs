use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{LedgerError, StatusEvent, StatusLedger};
use crate::models::job::JobId;

struct Entry {
    events: VecDeque<StatusEvent>,
    expires_at: Instant,
}

/// Process-local ledger with the same ordering and expiry rules as the Redis one.
/// Used by tests and by single-process development runs.
pub struct InMemoryLedger {
    ttl: Duration,
    entries: RwLock<HashMap<JobId, Entry>>,
}

impl InMemoryLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StatusLedger for InMemoryLedger {
    async fn append(&self, job_id: &JobId, event: StatusEvent) -> Result<(), LedgerError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let entry = entries.entry(job_id.clone()).or_insert_with(|| Entry {
            events: VecDeque::new(),
            expires_at: now,
        });
        if entry.expires_at < now {
            entry.events.clear();
        }
        entry.events.push_front(event);
        entry.expires_at = now + self.ttl;
        Ok(())
    }

    async fn read(&self, job_id: &JobId) -> Result<Vec<StatusEvent>, LedgerError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(job_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.events.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, job_id: &JobId) -> Result<(), LedgerError> {
        self.entries.write().await.remove(job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JobStatus;

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_read_returns_most_recent_first() {
        let ledger = ledger();
        let job = JobId::from("job-1");
        ledger
            .append(&job, StatusEvent::new(JobStatus::AnalyzingJd, "analyzing", None))
            .await
            .unwrap();
        ledger
            .append(&job, StatusEvent::new(JobStatus::JdAnalyzed, "analyzed", None))
            .await
            .unwrap();

        let stored = ledger.read(&job).await.unwrap();
        assert_eq!(stored[0].status, JobStatus::JdAnalyzed);
        assert_eq!(stored[1].status, JobStatus::AnalyzingJd);
    }

    #[tokio::test]
    async fn test_read_chronological_reverses_stored_order() {
        let ledger = ledger();
        let job = JobId::from("job-1");
        for status in [
            JobStatus::JobQueued,
            JobStatus::AnalyzingJd,
            JobStatus::JdAnalyzed,
        ] {
            ledger
                .append(&job, StatusEvent::new(status, status.as_str(), None))
                .await
                .unwrap();
        }

        let statuses: Vec<_> = ledger
            .read_chronological(&job)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                JobStatus::JobQueued,
                JobStatus::AnalyzingJd,
                JobStatus::JdAnalyzed
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_job_reads_empty() {
        let ledger = ledger();
        assert!(ledger.read(&JobId::from("missing")).await.unwrap().is_empty());
        assert!(ledger
            .read_chronological(&JobId::from("missing"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_ledger() {
        let ledger = ledger();
        let job = JobId::from("job-1");
        ledger
            .append(&job, StatusEvent::new(JobStatus::JobQueued, "queued", None))
            .await
            .unwrap();
        ledger.clear(&job).await.unwrap();
        assert!(ledger.read(&job).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_ledger_reads_empty() {
        let ledger = InMemoryLedger::new(Duration::ZERO);
        let job = JobId::from("job-1");
        ledger
            .append(&job, StatusEvent::new(JobStatus::JobQueued, "queued", None))
            .await
            .unwrap();
        assert!(ledger.read(&job).await.unwrap().is_empty());
    }
}
