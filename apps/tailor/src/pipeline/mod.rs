// Resume-tailoring pipeline.
// Scrape → Analyze → Rank Projects → Rank Skills → Generate Descriptions,
// each stage a queue consumer that enriches the shared job context.
// All generation calls go through llm_client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::llm_client::GenerationError;
use crate::models::job::{ContextConflict, PayloadError};
use crate::queue::QueueError;

pub mod entry;
pub mod handlers;
pub mod processor;
pub mod prompts;
pub mod schemas;
pub mod stage;

pub use entry::{SubmitError, TailorPipeline, TailorRequest};
pub use processor::StageProcessor;
pub use stage::Stage;

/// Application-tier failure. Recorded as an `ERROR` status and returned as an
/// error-shaped result; never handed back to the queue for retry.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("{0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Generation call failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Generation service returned an empty response")]
    EmptyResponse,

    #[error("Generation response is not valid JSON: {0}")]
    MalformedResponse(serde_json::Error),

    #[error("Generation response does not match the expected schema: {0}")]
    UnexpectedShape(serde_json::Error),

    #[error("{0}")]
    Unsuccessful(String),

    #[error("Invalid generation output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    ContextConflict(#[from] ContextConflict),

    #[error("Failed to serialize stage input: {0}")]
    Serialization(serde_json::Error),
}

impl StageFailure {
    /// Failures a fresh prompt might fix.
    pub fn is_malformed_output(&self) -> bool {
        matches!(
            self,
            StageFailure::MalformedResponse(_) | StageFailure::UnexpectedShape(_)
        )
    }
}

/// Infrastructure-tier failure. Propagated to the queue so the job is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Value returned by every stage processor and stored as the queue job's
/// return value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StageResult {
    Success {
        data: Value,
        result: Value,
        #[serde(rename = "processedAt")]
        processed_at: DateTime<Utc>,
    },
    Failure {
        error: String,
        data: Value,
        #[serde(rename = "processedAt")]
        processed_at: DateTime<Utc>,
    },
}

impl StageResult {
    pub fn is_success(&self) -> bool {
        matches!(self, StageResult::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_result_shape() {
        let result = StageResult::Success {
            data: json!({"jobId": "j"}),
            result: json!({"jobTitle": "Engineer"}),
            processed_at: Utc::now(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["data"]["jobId"], "j");
        assert_eq!(value["result"]["jobTitle"], "Engineer");
        assert!(value["processedAt"].is_string());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failure_result_shape() {
        let result = StageResult::Failure {
            error: StageFailure::MissingInput("context.jobDescription").to_string(),
            data: json!({}),
            processed_at: Utc::now(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value["error"],
            "Missing required input: context.jobDescription"
        );
        assert!(value["processedAt"].is_string());
        assert!(!result.is_success());
    }

    #[test]
    fn test_only_parse_failures_allow_reprompt() {
        let bad_json = serde_json::from_str::<Value>("nope").unwrap_err();
        assert!(StageFailure::MalformedResponse(bad_json).is_malformed_output());
        assert!(!StageFailure::EmptyResponse.is_malformed_output());
        assert!(!StageFailure::MissingInput("userData.skills").is_malformed_output());
    }
}
