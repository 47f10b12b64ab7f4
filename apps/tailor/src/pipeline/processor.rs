//! Stage dispatcher: the one processor every stage worker runs.
//!
//! validate → announce → invoke → parse → merge & advance, driven by the
//! stage's row in `PIPELINE`. Application-tier failures end here as an `ERROR`
//! status plus a failure result; only ledger and queue errors escape as
//! `PipelineError` for the queue to retry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::ledger::{JobStatus, StatusEvent, StatusLedger};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{Content, GenerationClient, GenerationConfig};
use crate::models::job::{payload_job_id, JobContext, JobId, StageJob};
use crate::pipeline::prompts::REPROMPT_TEMPLATE;
use crate::pipeline::schemas::StageOutput;
use crate::pipeline::stage::{Stage, StageDescriptor};
use crate::pipeline::{PipelineError, StageFailure, StageResult};
use crate::queue::{JobQueue, StageProducer};

pub struct StageProcessor {
    llm: Arc<dyn GenerationClient>,
    ledger: Arc<dyn StatusLedger>,
    queue: Arc<dyn JobQueue>,
    model: String,
    reprompt_attempts: u32,
}

impl StageProcessor {
    pub fn new(
        llm: Arc<dyn GenerationClient>,
        ledger: Arc<dyn StatusLedger>,
        queue: Arc<dyn JobQueue>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            ledger,
            queue,
            model: model.into(),
            reprompt_attempts: 0,
        }
    }

    /// Extra attempts granted when a response is not decodable JSON.
    pub fn with_reprompt_attempts(mut self, attempts: u32) -> Self {
        self.reprompt_attempts = attempts;
        self
    }

    pub async fn process(&self, stage: Stage, payload: &Value) -> Result<StageResult, PipelineError> {
        let descriptor = stage.descriptor();

        let job = match StageJob::from_payload(payload) {
            Ok(job) => job,
            Err(err) => {
                let context = payload.get("context").cloned().unwrap_or_else(|| json!({}));
                return self
                    .reject(stage, payload_job_id(payload).as_ref(), context, err.into())
                    .await;
            }
        };
        let context_at_entry = serde_json::to_value(&job.context)?;

        let prompt = match (descriptor.prepare)(&job) {
            Ok(prompt) => prompt,
            Err(failure) => {
                return self
                    .reject(stage, Some(&job.job_id), context_at_entry, failure)
                    .await
            }
        };

        self.ledger
            .append(
                &job.job_id,
                StatusEvent::new(descriptor.started, descriptor.started_message, None),
            )
            .await?;

        let (output, context) = match self.run(descriptor, &job, prompt).await {
            Ok(done) => done,
            Err(failure) => {
                return self
                    .reject(stage, Some(&job.job_id), context_at_entry, failure)
                    .await
            }
        };

        let result = output.to_value()?;
        self.ledger
            .append(
                &job.job_id,
                StatusEvent::new(
                    descriptor.finished,
                    descriptor.finished_message,
                    Some(result.clone()),
                ),
            )
            .await?;
        info!(
            "Stage {} set context.{} for job {}",
            stage, descriptor.context_key, job.job_id
        );

        match stage.next() {
            Some(next) => {
                StageProducer::new(self.queue.clone(), next)
                    .enqueue(job.job_id.clone(), context, job.user_data)
                    .await?;
            }
            None => {
                let final_context = serde_json::to_value(&context)?;
                self.ledger
                    .append(
                        &job.job_id,
                        StatusEvent::new(
                            JobStatus::Completed,
                            "Resume tailoring completed",
                            Some(final_context),
                        ),
                    )
                    .await?;
                info!("Job {} completed with context {:?}", job.job_id, context.keys());
            }
        }

        Ok(StageResult::Success {
            data: payload.clone(),
            result,
            processed_at: Utc::now(),
        })
    }

    async fn run(
        &self,
        descriptor: &StageDescriptor,
        job: &StageJob,
        prompt: String,
    ) -> Result<(StageOutput, JobContext), StageFailure> {
        let output = self.generate(descriptor, job, prompt).await?;
        let mut context = job.context.clone();
        context.merge(output.clone())?;
        Ok((output, context))
    }

    /// Calls the generation service and parses the reply, re-prompting on
    /// undecodable output while attempts remain.
    async fn generate(
        &self,
        descriptor: &StageDescriptor,
        job: &StageJob,
        prompt: String,
    ) -> Result<StageOutput, StageFailure> {
        let config = GenerationConfig::json(format!(
            "{}\n\n{}",
            descriptor.system_instruction, JSON_ONLY_INSTRUCTION
        ));
        let mut contents = vec![Content::user(prompt)];

        let mut reprompts = 0;
        loop {
            let text = self.llm.generate(&self.model, &config, &contents).await?;
            match (descriptor.parse)(&text, job) {
                Err(failure)
                    if failure.is_malformed_output() && reprompts < self.reprompt_attempts =>
                {
                    reprompts += 1;
                    warn!(
                        "Stage {} got an undecodable reply for job {} ({}), re-prompting {}/{}",
                        descriptor.stage, job.job_id, failure, reprompts, self.reprompt_attempts
                    );
                    contents.push(Content::model(text));
                    contents.push(Content::user(
                        REPROMPT_TEMPLATE.replace("{error}", &failure.to_string()),
                    ));
                }
                parsed => return parsed,
            }
        }
    }

    async fn reject(
        &self,
        stage: Stage,
        job_id: Option<&JobId>,
        context: Value,
        failure: StageFailure,
    ) -> Result<StageResult, PipelineError> {
        let message = failure.to_string();

        match job_id {
            Some(job_id) => {
                warn!("Stage {} failed for job {}: {}", stage, job_id, message);
                self.ledger
                    .append(
                        job_id,
                        StatusEvent::new(
                            JobStatus::Error,
                            message.clone(),
                            Some(json!({ "stage": stage.as_str() })),
                        ),
                    )
                    .await?;
            }
            None => warn!("Stage {} dropped a job without jobId: {}", stage, message),
        }

        Ok(StageResult::Failure {
            error: message,
            data: context,
            processed_at: Utc::now(),
        })
    }
}
