//! The pipeline as an ordered table of stage descriptors.
//!
//! Advancement is derived from table order: a stage's successor is the next
//! row. Each row carries what the dispatcher needs to run the stage: its queue,
//! the context key it owns, its status milestones, its system instruction, and
//! the functions that validate input/build the prompt and parse the response.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ledger::JobStatus;
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::models::job::StageJob;
use crate::models::user::Project;
use crate::pipeline::prompts::{
    ANALYZE_PROMPT_TEMPLATE, ANALYZE_SYSTEM, GENERATE_DESCRIPTIONS_PROMPT_TEMPLATE,
    GENERATE_DESCRIPTIONS_SYSTEM, RANK_PROJECTS_PROMPT_TEMPLATE, RANK_PROJECTS_SYSTEM,
    RANK_SKILLS_PROMPT_TEMPLATE, RANK_SKILLS_SYSTEM, SCRAPE_PROMPT_TEMPLATE, SCRAPE_SYSTEM,
};
use crate::pipeline::schemas::{
    decode_response, reconcile_projects, AnalysedJobDescription, RankedProjects, RankedSkills,
    ScrapeOutput, StageOutput,
};
use crate::pipeline::StageFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Scrape,
    Analyze,
    RankProjects,
    RankSkills,
    GenerateDescriptions,
}

/// Validates a job's required input and renders the prompt content.
pub type PrepareFn = fn(&StageJob) -> Result<String, StageFailure>;

/// Decodes and validates a generation response into the stage's output.
pub type ParseFn = fn(&str, &StageJob) -> Result<StageOutput, StageFailure>;

pub struct StageDescriptor {
    pub stage: Stage,
    pub queue: &'static str,
    pub context_key: &'static str,
    pub started: JobStatus,
    pub started_message: &'static str,
    pub finished: JobStatus,
    pub finished_message: &'static str,
    pub system_instruction: &'static str,
    pub prepare: PrepareFn,
    pub parse: ParseFn,
}

pub static PIPELINE: [StageDescriptor; 5] = [
    StageDescriptor {
        stage: Stage::Scrape,
        queue: "scrape-job-link",
        context_key: "jobDescription",
        started: JobStatus::ScrappingJobLink,
        started_message: "Scraping job description from link",
        finished: JobStatus::JobDescriptionScrapped,
        finished_message: "Job description scraped",
        system_instruction: SCRAPE_SYSTEM,
        prepare: prepare_scrape,
        parse: parse_scrape,
    },
    StageDescriptor {
        stage: Stage::Analyze,
        queue: "analyze-jd",
        context_key: "analysedJobDescription",
        started: JobStatus::AnalyzingJd,
        started_message: "Analyzing job description",
        finished: JobStatus::JdAnalyzed,
        finished_message: "Job description analyzed",
        system_instruction: ANALYZE_SYSTEM,
        prepare: prepare_analyze,
        parse: parse_analyze,
    },
    StageDescriptor {
        stage: Stage::RankProjects,
        queue: "rank-projects",
        context_key: "rankedProjects",
        started: JobStatus::RankingProjects,
        started_message: "Ranking projects against job requirements",
        finished: JobStatus::ProjectsRanked,
        finished_message: "Projects ranked",
        system_instruction: RANK_PROJECTS_SYSTEM,
        prepare: prepare_rank_projects,
        parse: parse_rank_projects,
    },
    StageDescriptor {
        stage: Stage::RankSkills,
        queue: "rank-skills",
        context_key: "rankedSkills",
        started: JobStatus::RankingSkills,
        started_message: "Ranking skills against job requirements",
        finished: JobStatus::SkillsRanked,
        finished_message: "Skills ranked",
        system_instruction: RANK_SKILLS_SYSTEM,
        prepare: prepare_rank_skills,
        parse: parse_rank_skills,
    },
    StageDescriptor {
        stage: Stage::GenerateDescriptions,
        queue: "generate-project-description",
        context_key: "generatedProjectDescription",
        started: JobStatus::GeneratingProjectDescription,
        started_message: "Generating project descriptions",
        finished: JobStatus::ProjectDescriptionGenerated,
        finished_message: "Project descriptions generated",
        system_instruction: GENERATE_DESCRIPTIONS_SYSTEM,
        prepare: prepare_generate_descriptions,
        parse: parse_generate_descriptions,
    },
];

impl Stage {
    pub fn all() -> impl Iterator<Item = Stage> {
        PIPELINE.iter().map(|d| d.stage)
    }

    pub fn descriptor(self) -> &'static StageDescriptor {
        &PIPELINE[self as usize]
    }

    pub fn next(self) -> Option<Stage> {
        PIPELINE.get(self as usize + 1).map(|d| d.stage)
    }

    pub fn queue(self) -> &'static str {
        self.descriptor().queue
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Analyze => "analyze",
            Stage::RankProjects => "rank-projects",
            Stage::RankSkills => "rank-skills",
            Stage::GenerateDescriptions => "generate-descriptions",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Input validation and prompt rendering
// ────────────────────────────────────────────────────────────────────────────

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StageFailure> {
    serde_json::to_string_pretty(value).map_err(StageFailure::Serialization)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require_analysed(job: &StageJob) -> Result<&AnalysedJobDescription, StageFailure> {
    job.context
        .analysed_job_description
        .as_ref()
        .ok_or(StageFailure::MissingInput("context.analysedJobDescription"))
}

fn require_projects(job: &StageJob) -> Result<&[Project], StageFailure> {
    if job.user_data.projects.is_empty() {
        return Err(StageFailure::MissingInput("userData.projects"));
    }
    Ok(&job.user_data.projects)
}

fn prepare_scrape(job: &StageJob) -> Result<String, StageFailure> {
    let link = non_blank(job.job_link.as_deref()).ok_or(StageFailure::MissingInput("jobLink"))?;
    Ok(SCRAPE_PROMPT_TEMPLATE.replace("{job_link}", link))
}

fn prepare_analyze(job: &StageJob) -> Result<String, StageFailure> {
    let description = non_blank(job.context.job_description.as_deref())
        .ok_or(StageFailure::MissingInput("context.jobDescription"))?;
    Ok(ANALYZE_PROMPT_TEMPLATE.replace("{job_description}", description))
}

fn prepare_rank_projects(job: &StageJob) -> Result<String, StageFailure> {
    let requirements = require_analysed(job)?;
    let projects = require_projects(job)?;

    Ok(RANK_PROJECTS_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{requirements_json}", &to_json(requirements)?)
        .replace("{projects_json}", &to_json(projects)?))
}

fn prepare_rank_skills(job: &StageJob) -> Result<String, StageFailure> {
    if job.user_data.skills.is_empty() {
        return Err(StageFailure::MissingInput("userData.skills"));
    }
    let requirements = require_analysed(job)?;

    Ok(RANK_SKILLS_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{requirements_json}", &to_json(requirements)?)
        .replace(
            "{ranked_projects_json}",
            &to_json(&job.context.ranked_projects)?,
        )
        .replace("{skills_json}", &to_json(&job.user_data.skills)?))
}

fn prepare_generate_descriptions(job: &StageJob) -> Result<String, StageFailure> {
    let projects = require_projects(job)?;
    let ranked_skills = job
        .context
        .ranked_skills
        .as_ref()
        .ok_or(StageFailure::MissingInput("context.rankedSkills"))?;

    Ok(GENERATE_DESCRIPTIONS_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace(
            "{requirements_json}",
            &to_json(&job.context.analysed_job_description)?,
        )
        .replace("{ranked_skills_json}", &to_json(ranked_skills)?)
        .replace("{projects_json}", &to_json(projects)?))
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsing
// ────────────────────────────────────────────────────────────────────────────

fn parse_scrape(text: &str, _job: &StageJob) -> Result<StageOutput, StageFailure> {
    let scraped: ScrapeOutput = decode_response(text)?;
    if !scraped.success {
        return Err(StageFailure::Unsuccessful(
            "Job posting could not be scraped from the link".to_string(),
        ));
    }
    let description = non_blank(scraped.job_description.as_deref()).ok_or_else(|| {
        StageFailure::Unsuccessful("Scrape returned no job description".to_string())
    })?;
    Ok(StageOutput::JobDescription(description.to_string()))
}

fn parse_analyze(text: &str, _job: &StageJob) -> Result<StageOutput, StageFailure> {
    let analysed: AnalysedJobDescription = decode_response(text)?;
    Ok(StageOutput::AnalysedJobDescription(analysed.validate()?))
}

fn parse_rank_projects(text: &str, _job: &StageJob) -> Result<StageOutput, StageFailure> {
    let ranked: RankedProjects = decode_response(text)?;
    Ok(StageOutput::RankedProjects(ranked.normalize()?))
}

fn parse_rank_skills(text: &str, job: &StageJob) -> Result<StageOutput, StageFailure> {
    let ranked: RankedSkills = decode_response(text)?;
    Ok(StageOutput::RankedSkills(
        ranked.reconcile(&job.user_data.skills)?,
    ))
}

fn parse_generate_descriptions(text: &str, job: &StageJob) -> Result<StageOutput, StageFailure> {
    let generated: Vec<Project> = decode_response(text)?;
    let rewritten = reconcile_projects(generated, &job.user_data.projects)?;
    Ok(StageOutput::GeneratedProjectDescription(rewritten))
}
