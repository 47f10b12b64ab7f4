use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::{JobStatus, LedgerError, StatusEvent, StatusLedger};
use crate::models::job::{JobContext, JobId, StageJob};
use crate::models::user::UserData;
use crate::pipeline::Stage;
use crate::queue::{JobQueue, QueueError, StageProducer};

/// Submission accepted by the entry point. Exactly one of `job_description`
/// and `job_link` is needed; a description wins when both are given.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailorRequest {
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub job_link: Option<String>,
    #[serde(default)]
    pub user_data: UserData,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Either jobDescription or jobLink is required")]
    MissingJobSource,

    #[error("Failed to enqueue job: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to record job status: {0}")]
    Ledger(#[from] LedgerError),
}

/// Starts tailoring runs. Returns as soon as the first stage is enqueued;
/// progress is observed through the status ledger.
#[derive(Clone)]
pub struct TailorPipeline {
    queue: Arc<dyn JobQueue>,
    ledger: Arc<dyn StatusLedger>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TailorPipeline {
    pub fn new(queue: Arc<dyn JobQueue>, ledger: Arc<dyn StatusLedger>) -> Self {
        Self { queue, ledger }
    }

    pub async fn submit(&self, request: TailorRequest) -> Result<JobId, SubmitError> {
        let job_id = request
            .job_id
            .filter(|id| !id.is_blank())
            .unwrap_or_else(JobId::generate);

        let (stage, job) = match (
            non_blank(request.job_description),
            non_blank(request.job_link),
        ) {
            (Some(description), _) => (
                Stage::Analyze,
                StageJob::new(
                    job_id.clone(),
                    JobContext::with_job_description(description),
                    request.user_data,
                ),
            ),
            (None, Some(link)) => (
                Stage::Scrape,
                StageJob::new(job_id.clone(), JobContext::default(), request.user_data)
                    .with_job_link(link),
            ),
            (None, None) => return Err(SubmitError::MissingJobSource),
        };

        self.ledger
            .append(
                &job_id,
                StatusEvent::new(
                    JobStatus::JobQueued,
                    "Tailoring job queued",
                    Some(serde_json::json!({ "stage": stage.as_str() })),
                ),
            )
            .await?;
        if let Err(e) = StageProducer::new(self.queue.clone(), stage)
            .enqueue_job(job)
            .await
        {
            let event = StatusEvent::new(
                JobStatus::Error,
                format!("Failed to enqueue job: {e}"),
                Some(serde_json::json!({ "stage": stage.as_str() })),
            );
            if let Err(ledger_err) = self.ledger.append(&job_id, event).await {
                warn!("Could not record enqueue failure for job {}: {}", job_id, ledger_err);
            }
            return Err(e.into());
        }

        info!("Tailoring job {} submitted at stage {}", job_id, stage);
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::queue::{InMemoryQueue, JobCounts, JobOptions, JobState, QueuedJob};

    struct ClosedQueue;

    #[async_trait]
    impl JobQueue for ClosedQueue {
        async fn enqueue(&self, queue: &str, _: Value, _: JobOptions) -> Result<String, QueueError> {
            Err(QueueError::UnknownJob {
                queue: queue.to_string(),
                id: "new".to_string(),
            })
        }

        async fn reserve(&self, _: &str) -> Result<Option<QueuedJob>, QueueError> {
            Ok(None)
        }

        async fn complete(&self, _: &str, _: &str, _: Value) -> Result<(), QueueError> {
            Ok(())
        }

        async fn fail(&self, _: &str, _: &str, _: &str) -> Result<JobState, QueueError> {
            Ok(JobState::Failed)
        }

        async fn get_job(&self, _: &str, _: &str) -> Result<Option<QueuedJob>, QueueError> {
            Ok(None)
        }

        async fn counts(&self, _: &str) -> Result<JobCounts, QueueError> {
            Ok(JobCounts::default())
        }
    }

    fn pipeline() -> (TailorPipeline, Arc<InMemoryQueue>, Arc<InMemoryLedger>) {
        let queue = Arc::new(InMemoryQueue::new());
        let ledger = Arc::new(InMemoryLedger::new(Duration::from_secs(60)));
        (
            TailorPipeline::new(queue.clone(), ledger.clone()),
            queue,
            ledger,
        )
    }

    fn request(description: Option<&str>, link: Option<&str>) -> TailorRequest {
        TailorRequest {
            job_id: None,
            job_description: description.map(str::to_string),
            job_link: link.map(str::to_string),
            user_data: UserData::default(),
        }
    }

    #[tokio::test]
    async fn test_description_enters_at_analyze() {
        let (pipeline, queue, ledger) = pipeline();

        let job_id = pipeline
            .submit(request(Some("React experience required"), None))
            .await
            .unwrap();

        let job = queue.reserve("analyze-jd").await.unwrap().unwrap();
        assert_eq!(job.payload["jobId"], job_id.as_str());
        assert_eq!(
            job.payload["context"]["jobDescription"],
            "React experience required"
        );
        assert!(queue.reserve("scrape-job-link").await.unwrap().is_none());

        let events = ledger.read(&job_id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, JobStatus::JobQueued);
    }

    #[tokio::test]
    async fn test_link_only_enters_at_scrape() {
        let (pipeline, queue, _) = pipeline();

        pipeline
            .submit(request(Some("  "), Some("https://jobs.example.com/42")))
            .await
            .unwrap();

        let job = queue.reserve("scrape-job-link").await.unwrap().unwrap();
        assert_eq!(job.payload["jobLink"], "https://jobs.example.com/42");
        assert!(job.payload["context"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_caller_supplied_job_id_is_kept() {
        let (pipeline, _, _) = pipeline();
        let mut req = request(Some("jd"), None);
        req.job_id = Some(JobId::from("client-7"));

        let job_id = pipeline.submit(req).await.unwrap();
        assert_eq!(job_id.as_str(), "client-7");
    }

    #[tokio::test]
    async fn test_caller_job_id_is_trimmed_before_use() {
        let (pipeline, queue, ledger) = pipeline();
        let req: TailorRequest = serde_json::from_value(serde_json::json!({
            "jobId": " client-7 ",
            "jobDescription": "jd"
        }))
        .unwrap();

        let job_id = pipeline.submit(req).await.unwrap();

        assert_eq!(job_id.as_str(), "client-7");
        let job = queue.reserve("analyze-jd").await.unwrap().unwrap();
        assert_eq!(job.payload["jobId"], "client-7");
        assert_eq!(ledger.read(&JobId::from("client-7")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_caller_job_id_is_replaced() {
        let (pipeline, _, _) = pipeline();
        let mut req = request(Some("jd"), None);
        req.job_id = Some(JobId::from("   "));

        let job_id = pipeline.submit(req).await.unwrap();
        assert!(!job_id.is_blank());
    }

    #[tokio::test]
    async fn test_enqueue_failure_is_recorded_in_the_ledger() {
        let ledger = Arc::new(InMemoryLedger::new(Duration::from_secs(60)));
        let pipeline = TailorPipeline::new(Arc::new(ClosedQueue), ledger.clone());
        let mut req = request(Some("jd"), None);
        req.job_id = Some(JobId::from("job-5"));

        let err = pipeline.submit(req).await.unwrap_err();

        assert!(matches!(err, SubmitError::Queue(_)));
        let events = ledger.read_chronological(&JobId::from("job-5")).await.unwrap();
        let statuses: Vec<_> = events.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![JobStatus::JobQueued, JobStatus::Error]);
        assert_eq!(events[1].data, Some(serde_json::json!({"stage": "analyze"})));
    }

    #[tokio::test]
    async fn test_request_without_source_is_rejected() {
        let (pipeline, queue, _) = pipeline();

        let err = pipeline.submit(request(None, Some(" "))).await.unwrap_err();

        assert!(matches!(err, SubmitError::MissingJobSource));
        assert_eq!(queue.counts("analyze-jd").await.unwrap().waiting, 0);
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let req: TailorRequest = serde_json::from_value(serde_json::json!({
            "jobDescription": "jd",
            "userData": {"skills": [{"name": "React"}]}
        }))
        .unwrap();
        assert_eq!(req.job_description.as_deref(), Some("jd"));
        assert_eq!(req.user_data.skills[0].name, "React");
        assert!(req.job_id.is_none());
    }
}
