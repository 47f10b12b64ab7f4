use std::sync::Arc;

use tracing::info;

use super::{JobOptions, JobQueue, QueueError};
use crate::models::job::{JobContext, JobId, StageJob};
use crate::models::user::UserData;
use crate::pipeline::Stage;

/// Enqueues work onto one stage's queue with the shared retry/retention options.
#[derive(Clone)]
pub struct StageProducer {
    queue: Arc<dyn JobQueue>,
    stage: Stage,
}

impl StageProducer {
    pub fn new(queue: Arc<dyn JobQueue>, stage: Stage) -> Self {
        Self { queue, stage }
    }

    pub async fn enqueue(
        &self,
        job_id: JobId,
        context: JobContext,
        user_data: UserData,
    ) -> Result<String, QueueError> {
        self.enqueue_job(StageJob::new(job_id, context, user_data))
            .await
    }

    pub async fn enqueue_job(&self, job: StageJob) -> Result<String, QueueError> {
        let payload = serde_json::to_value(&job)?;
        let queue_job_id = self
            .queue
            .enqueue(self.stage.queue(), payload, JobOptions::default())
            .await?;

        info!(
            "Enqueued job {} on {} as {}",
            job.job_id,
            self.stage.queue(),
            queue_job_id
        );
        Ok(queue_job_id)
    }
}
