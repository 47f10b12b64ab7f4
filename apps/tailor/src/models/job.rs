use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::user::{Project, UserData};
use crate::pipeline::schemas::{AnalysedJobDescription, RankedProjects, RankedSkills, StageOutput};

/// Opaque identifier of one tailoring run. Stable for the whole pipeline.
///
/// Surrounding whitespace is stripped on construction, so every ledger key
/// and queue payload for a run agrees on the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(JobId::from)
    }
}

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when a stage tries to write a context key that an earlier stage
/// already owns.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("context key '{key}' is already set")]
pub struct ContextConflict {
    pub key: &'static str,
}

/// The accumulating record threaded through every stage.
///
/// Keys are only ever added, in pipeline order. The whole record travels with
/// each stage job so a failure leaves every earlier result in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysed_job_description: Option<AnalysedJobDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_projects: Option<RankedProjects>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranked_skills: Option<RankedSkills>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_project_description: Option<Vec<Project>>,
}

impl JobContext {
    pub fn with_job_description(job_description: impl Into<String>) -> Self {
        Self {
            job_description: Some(job_description.into()),
            ..Self::default()
        }
    }

    /// Adds one stage's output under its own key. Never overwrites.
    pub fn merge(&mut self, output: StageOutput) -> Result<(), ContextConflict> {
        let key = output.key();
        match output {
            StageOutput::JobDescription(text) => set_once(&mut self.job_description, text, key),
            StageOutput::AnalysedJobDescription(analysed) => {
                set_once(&mut self.analysed_job_description, analysed, key)
            }
            StageOutput::RankedProjects(ranked) => set_once(&mut self.ranked_projects, ranked, key),
            StageOutput::RankedSkills(ranked) => set_once(&mut self.ranked_skills, ranked, key),
            StageOutput::GeneratedProjectDescription(projects) => {
                set_once(&mut self.generated_project_description, projects, key)
            }
        }
    }

    /// Top-level keys currently present, in pipeline order.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.job_description.is_some() {
            keys.push("jobDescription");
        }
        if self.analysed_job_description.is_some() {
            keys.push("analysedJobDescription");
        }
        if self.ranked_projects.is_some() {
            keys.push("rankedProjects");
        }
        if self.ranked_skills.is_some() {
            keys.push("rankedSkills");
        }
        if self.generated_project_description.is_some() {
            keys.push("generatedProjectDescription");
        }
        keys
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: &'static str) -> Result<(), ContextConflict> {
    if slot.is_some() {
        return Err(ContextConflict { key });
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("job payload is missing jobId")]
    MissingJobId,

    #[error("job payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Payload carried by every stage queue job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageJob {
    pub job_id: JobId,
    #[serde(default)]
    pub context: JobContext,
    #[serde(default)]
    pub user_data: UserData,
    /// Only present on Scrape jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_link: Option<String>,
    #[serde(default = "Utc::now")]
    pub requested_at: DateTime<Utc>,
}

impl StageJob {
    pub fn new(job_id: JobId, context: JobContext, user_data: UserData) -> Self {
        Self {
            job_id,
            context,
            user_data,
            job_link: None,
            requested_at: Utc::now(),
        }
    }

    pub fn with_job_link(mut self, link: impl Into<String>) -> Self {
        self.job_link = Some(link.into());
        self
    }

    /// Decodes a raw queue payload. A payload without a usable `jobId` is
    /// reported separately so callers can tell "unknown job" from "bad shape".
    pub fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        if payload_job_id(payload).is_none() {
            return Err(PayloadError::MissingJobId);
        }
        Ok(serde_json::from_value(payload.clone())?)
    }
}

/// Best-effort `jobId` lookup on a payload that may not decode.
pub fn payload_job_id(payload: &Value) -> Option<JobId> {
    payload
        .get("jobId")
        .and_then(Value::as_str)
        .map(JobId::from)
        .filter(|id| !id.is_blank())
}
