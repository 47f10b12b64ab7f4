use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{JobQueue, JobState, QueueError, QueuedJob};
use crate::models::job::payload_job_id;
use crate::pipeline::{Stage, StageProcessor};

/// Polls one stage queue and feeds reserved jobs to the dispatcher.
///
/// A processor result of either shape completes the job. A `PipelineError`
/// is reported back as a failed attempt, which the queue retries with backoff.
pub struct StageWorker {
    stage: Stage,
    queue: Arc<dyn JobQueue>,
    processor: Arc<StageProcessor>,
    poll_interval: Duration,
}

impl StageWorker {
    pub fn new(
        stage: Stage,
        queue: Arc<dyn JobQueue>,
        processor: Arc<StageProcessor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            stage,
            queue,
            processor,
            poll_interval,
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped. A job
    /// already in flight is always finished first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("Stage worker started on {}", self.stage.queue());

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.tick().await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => error!(error = %e, queue = self.stage.queue(), "Queue poll failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Stage worker stopped on {}", self.stage.queue());
    }

    /// Reserves and handles at most one job. Returns whether a job was handled.
    pub async fn tick(&self) -> Result<bool, QueueError> {
        let Some(job) = self.queue.reserve(self.stage.queue()).await? else {
            return Ok(false);
        };

        let job_id = payload_job_id(&job.payload)
            .map(|id| id.to_string())
            .unwrap_or_default();
        let span = info_span!(
            "stage_job",
            job_id = %job_id,
            stage = %self.stage,
            queue_job_id = %job.id,
            attempt = job.attempts_made + 1,
        );
        self.handle(job).instrument(span).await?;
        Ok(true)
    }

    async fn handle(&self, job: QueuedJob) -> Result<(), QueueError> {
        let queue = self.stage.queue();

        match self.processor.process(self.stage, &job.payload).await {
            Ok(result) => {
                let return_value = serde_json::to_value(&result)?;
                self.queue.complete(queue, &job.id, return_value).await?;
                if result.is_success() {
                    debug!("Stage job completed");
                } else {
                    debug!("Stage job completed with a recorded failure");
                }
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                match self.queue.fail(queue, &job.id, &reason).await? {
                    JobState::Delayed => {
                        warn!(error = %reason, "Stage job failed, retry scheduled")
                    }
                    _ => error!(
                        error = %reason,
                        attempts = job.opts.attempts,
                        "Stage job failed, attempts exhausted"
                    ),
                }
                Ok(())
            }
        }
    }
}
