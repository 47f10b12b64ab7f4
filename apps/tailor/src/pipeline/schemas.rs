//! Typed input/output schemas for each stage, validated at the stage boundary.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::llm_client::strip_json_fences;
use crate::models::user::{Project, Skill};
use crate::pipeline::StageFailure;

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ────────────────────────────────────────────────────────────────────────────
// Scrape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutput {
    pub success: bool,
    #[serde(default)]
    pub job_description: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Analyze
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysedJobDescription {
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub required_skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub preferred_skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tools: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub employment_type: Option<String>,
}

impl AnalysedJobDescription {
    pub fn validate(self) -> Result<Self, StageFailure> {
        let has_title = self
            .job_title
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_title
            && self.required_skills.is_empty()
            && self.preferred_skills.is_empty()
            && self.responsibilities.is_empty()
        {
            return Err(StageFailure::InvalidOutput(
                "no requirements could be extracted from the job description".to_string(),
            ));
        }
        Ok(self)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rank Projects
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub title: String,
    /// Relevance 0–100.
    pub score: f64,
    #[serde(default, deserialize_with = "nullable")]
    pub matched_skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProjects {
    pub ranked_projects: Vec<RankedProject>,
    #[serde(default, deserialize_with = "nullable")]
    pub unsorted_projects: Vec<RankedProject>,
    #[serde(default)]
    pub average_score: f64,
}

fn check_score(subject: &str, score: f64) -> Result<(), StageFailure> {
    if !(0.0..=100.0).contains(&score) {
        return Err(StageFailure::InvalidOutput(format!(
            "score {score} for '{subject}' is outside 0-100"
        )));
    }
    Ok(())
}

impl RankedProjects {
    /// Validates scores, orders by descending relevance and recomputes the
    /// average from the ranked list.
    pub fn normalize(mut self) -> Result<Self, StageFailure> {
        if self.ranked_projects.is_empty() {
            return Err(StageFailure::InvalidOutput(
                "no projects were ranked".to_string(),
            ));
        }
        for project in self.ranked_projects.iter().chain(&self.unsorted_projects) {
            check_score(&project.title, project.score)?;
        }

        if self.unsorted_projects.is_empty() {
            self.unsorted_projects = self.ranked_projects.clone();
        }
        self.ranked_projects
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        self.average_score = self.ranked_projects.iter().map(|p| p.score).sum::<f64>()
            / self.ranked_projects.len() as f64;
        Ok(self)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rank Skills
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreferenceCategory {
    /// Named by the posting, or a direct match for a required/preferred skill.
    Preferred,
    /// Adjacent to the posting's stack.
    Relevant,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEvaluation {
    pub category: PreferenceCategory,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSubSkill {
    pub name: String,
    pub evaluation: SkillEvaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSkill {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub sub_skills: Vec<RankedSubSkill>,
    pub evaluation: SkillEvaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedSkillGroup {
    pub category: String,
    #[serde(default, deserialize_with = "nullable")]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSkills {
    pub ranked_skills: Vec<RankedSkill>,
    #[serde(default, deserialize_with = "nullable")]
    pub recommended_skills: Vec<RecommendedSkillGroup>,
}

fn skill_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl RankedSkills {
    /// Checks scores and pins every ranked skill to the user's own profile.
    ///
    /// Matching is by name, ignoring case. `name`, `level`, `hide` and the
    /// sub-skill names come from the profile; only the evaluations come from
    /// the model. Skills the user does not have are dropped, as are invented
    /// sub-skills.
    pub fn reconcile(mut self, profile: &[Skill]) -> Result<Self, StageFailure> {
        let mut claimed = HashSet::new();
        let mut reconciled = Vec::with_capacity(self.ranked_skills.len());

        for candidate in self.ranked_skills {
            let key = skill_key(&candidate.name);
            let Some(owned) = profile.iter().find(|s| skill_key(&s.name) == key) else {
                tracing::warn!(
                    "Ranked skill '{}' is not in the profile; dropping it",
                    candidate.name
                );
                continue;
            };
            if !claimed.insert(key) {
                tracing::warn!("Skill '{}' was ranked more than once; keeping the first", owned.name);
                continue;
            }

            let sub_skills = owned
                .sub_skills
                .iter()
                .filter_map(|name| {
                    candidate
                        .sub_skills
                        .iter()
                        .find(|sub| skill_key(&sub.name) == skill_key(name))
                        .map(|sub| RankedSubSkill {
                            name: name.clone(),
                            evaluation: sub.evaluation.clone(),
                        })
                })
                .collect();

            reconciled.push(RankedSkill {
                name: owned.name.clone(),
                level: owned.level.clone(),
                hide: owned.hide,
                sub_skills,
                evaluation: candidate.evaluation,
            });
        }

        self.ranked_skills = reconciled;
        self.validate()
    }

    pub fn validate(self) -> Result<Self, StageFailure> {
        if self.ranked_skills.is_empty() {
            return Err(StageFailure::InvalidOutput("no skills were ranked".to_string()));
        }
        for skill in &self.ranked_skills {
            check_score(&skill.name, skill.evaluation.score)?;
            for sub in &skill.sub_skills {
                check_score(&sub.name, sub.evaluation.score)?;
            }
        }
        Ok(self)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generate Descriptions
// ────────────────────────────────────────────────────────────────────────────

/// True for `<ul>…</ul>` containing at least one `<li>` with visible text.
pub fn is_bullet_list(html: &str) -> bool {
    let html = html.trim();
    if !(html.starts_with("<ul") && html.ends_with("</ul>")) {
        return false;
    }
    html.split("<li").skip(1).any(|item| {
        let body = item.split_once('>').map_or("", |(_, rest)| rest);
        let body = body.split("</li>").next().unwrap_or_default();
        has_visible_text(body)
    })
}

/// True when `html` has non-whitespace text outside of tags.
fn has_visible_text(html: &str) -> bool {
    let mut in_tag = false;
    html.chars().any(|c| match c {
        '<' => {
            in_tag = true;
            false
        }
        '>' => {
            in_tag = false;
            false
        }
        c => !in_tag && !c.is_whitespace(),
    })
}

/// Lays generated descriptions (and polished titles) over the user's original
/// projects. Matching is by `id`, falling back to the same position when that
/// original is still unclaimed. Each original is used at most once. Every field
/// other than `description` and `title` comes from the original.
pub fn reconcile_projects(
    generated: Vec<Project>,
    originals: &[Project],
) -> Result<Vec<Project>, StageFailure> {
    let mut rewritten = Vec::with_capacity(generated.len());
    let mut claimed = HashSet::new();

    for (index, candidate) in generated.into_iter().enumerate() {
        let by_id = candidate.id.as_deref().and_then(|id| {
            originals
                .iter()
                .position(|p| p.id.as_deref() == Some(id))
        });
        let matched = match by_id {
            Some(position) if claimed.contains(&position) => {
                return Err(StageFailure::InvalidOutput(format!(
                    "project '{}' was generated more than once",
                    originals[position].title
                )));
            }
            Some(position) => Some(position),
            None => Some(index).filter(|i| *i < originals.len() && !claimed.contains(i)),
        };

        let Some(position) = matched else {
            tracing::warn!(
                "Generated project '{}' has no counterpart in the profile; dropping it",
                candidate.title
            );
            continue;
        };
        claimed.insert(position);
        let original = &originals[position];

        if !is_bullet_list(&candidate.description) {
            return Err(StageFailure::InvalidOutput(format!(
                "description for project '{}' is not a bullet list",
                original.title
            )));
        }

        let mut project = original.clone();
        project.description = candidate.description.trim().to_string();
        if !candidate.title.trim().is_empty() {
            project.title = candidate.title.trim().to_string();
        }
        rewritten.push(project);
    }

    if rewritten.is_empty() {
        return Err(StageFailure::InvalidOutput(
            "no project descriptions were generated".to_string(),
        ));
    }
    Ok(rewritten)
}

// ────────────────────────────────────────────────────────────────────────────
// Stage outputs and response decoding
// ────────────────────────────────────────────────────────────────────────────

/// One stage's contribution to the job context.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    JobDescription(String),
    AnalysedJobDescription(AnalysedJobDescription),
    RankedProjects(RankedProjects),
    RankedSkills(RankedSkills),
    GeneratedProjectDescription(Vec<Project>),
}

impl StageOutput {
    /// Context key this output is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            StageOutput::JobDescription(_) => "jobDescription",
            StageOutput::AnalysedJobDescription(_) => "analysedJobDescription",
            StageOutput::RankedProjects(_) => "rankedProjects",
            StageOutput::RankedSkills(_) => "rankedSkills",
            StageOutput::GeneratedProjectDescription(_) => "generatedProjectDescription",
        }
    }

    /// JSON form stored in the ledger and returned as the stage result.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            StageOutput::JobDescription(text) => Ok(Value::String(text.clone())),
            StageOutput::AnalysedJobDescription(v) => serde_json::to_value(v),
            StageOutput::RankedProjects(v) => serde_json::to_value(v),
            StageOutput::RankedSkills(v) => serde_json::to_value(v),
            StageOutput::GeneratedProjectDescription(v) => serde_json::to_value(v),
        }
    }
}

/// Decodes a model response that should be a JSON document, or a JSON string
/// containing one.
pub fn decode_response<T: DeserializeOwned>(text: &str) -> Result<T, StageFailure> {
    let body = strip_json_fences(text);
    if body.is_empty() {
        return Err(StageFailure::EmptyResponse);
    }

    let value: Value = serde_json::from_str(body).map_err(StageFailure::MalformedResponse)?;
    let value = match value {
        Value::String(inner) => {
            let inner = strip_json_fences(&inner);
            if inner.is_empty() {
                return Err(StageFailure::EmptyResponse);
            }
            serde_json::from_str(inner).map_err(StageFailure::MalformedResponse)?
        }
        other => other,
    };
    if value.is_null() {
        return Err(StageFailure::EmptyResponse);
    }

    serde_json::from_value(value).map_err(StageFailure::UnexpectedShape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project(id: &str, title: &str) -> Project {
        serde_json::from_value(json!({
            "id": id,
            "title": title,
            "description": "old text",
            "techStack": ["React"],
            "url": "https://example.com"
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_plain_json_document() {
        let parsed: ScrapeOutput =
            decode_response(r#"{"success": true, "jobDescription": "Build UIs"}"#).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.job_description.as_deref(), Some("Build UIs"));
    }

    #[test]
    fn test_decode_json_encoded_string() {
        let encoded = serde_json::to_string(r#"{"success": false, "jobDescription": null}"#).unwrap();
        let parsed: ScrapeOutput = decode_response(&encoded).unwrap();
        assert!(!parsed.success);
        assert!(parsed.job_description.is_none());
    }

    #[test]
    fn test_decode_fenced_json() {
        let parsed: RecommendedSkillGroup =
            decode_response("```json\n{\"category\": \"Cloud\", \"skills\": [\"AWS\"]}\n```").unwrap();
        assert_eq!(parsed.skills, vec!["AWS".to_string()]);
    }

    #[test]
    fn test_decode_empty_and_null_are_empty_responses() {
        assert!(matches!(
            decode_response::<ScrapeOutput>("   "),
            Err(StageFailure::EmptyResponse)
        ));
        assert!(matches!(
            decode_response::<ScrapeOutput>("null"),
            Err(StageFailure::EmptyResponse)
        ));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(matches!(
            decode_response::<ScrapeOutput>("Sure! Here is the analysis you asked for."),
            Err(StageFailure::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_reports_shape_mismatch() {
        assert!(matches!(
            decode_response::<ScrapeOutput>(r#"{"jobDescription": "x"}"#),
            Err(StageFailure::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_analysed_jd_accepts_nulls_for_lists() {
        let parsed: AnalysedJobDescription = decode_response(
            r#"{"jobTitle": "Frontend Engineer", "requiredSkills": ["React"], "tools": null, "salaryRange": null}"#,
        )
        .unwrap();
        let parsed = parsed.validate().unwrap();
        assert_eq!(parsed.required_skills, vec!["React".to_string()]);
        assert!(parsed.tools.is_empty());
    }

    #[test]
    fn test_analysed_jd_with_nothing_extracted_is_invalid() {
        let parsed: AnalysedJobDescription = decode_response("{}").unwrap();
        assert!(matches!(parsed.validate(), Err(StageFailure::InvalidOutput(_))));
    }

    #[test]
    fn test_ranked_projects_are_sorted_and_averaged() {
        let ranked: RankedProjects = decode_response(
            r#"{"rankedProjects": [
                {"projectId": "a", "title": "A", "score": 40, "matchedSkills": []},
                {"projectId": "b", "title": "B", "score": 90, "matchedSkills": ["React"]}
            ], "averageScore": 12}"#,
        )
        .unwrap();
        let ranked = ranked.normalize().unwrap();
        assert_eq!(ranked.ranked_projects[0].title, "B");
        assert_eq!(ranked.unsorted_projects[0].title, "A");
        assert!((ranked.average_score - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ranked_projects_reject_out_of_range_scores() {
        let ranked = RankedProjects {
            ranked_projects: vec![RankedProject {
                project_id: None,
                title: "A".to_string(),
                score: 140.0,
                matched_skills: vec![],
                reason: None,
            }],
            ..RankedProjects::default()
        };
        assert!(matches!(ranked.normalize(), Err(StageFailure::InvalidOutput(_))));
    }

    #[test]
    fn test_ranked_skills_category_serialization() {
        let ranked: RankedSkills = decode_response(
            r#"{"rankedSkills": [{"name": "React", "level": "PROFICIENT", "hide": false,
                "subSkills": [{"name": "Hooks", "evaluation": {"category": "Relevant", "score": 70}}],
                "evaluation": {"category": "Preferred", "score": 95}}],
                "recommendedSkills": [{"category": "Testing", "skills": ["Jest"]}]}"#,
        )
        .unwrap();
        let ranked = ranked.validate().unwrap();
        assert_eq!(
            ranked.ranked_skills[0].evaluation.category,
            PreferenceCategory::Preferred
        );
        let value = serde_json::to_value(&ranked).unwrap();
        assert_eq!(value["rankedSkills"][0]["evaluation"]["category"], "Preferred");
        assert_eq!(value["rankedSkills"][0]["subSkills"][0]["name"], "Hooks");
    }

    #[test]
    fn test_ranked_skills_require_at_least_one_skill() {
        assert!(matches!(
            RankedSkills::default().validate(),
            Err(StageFailure::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_bullet_list_detection() {
        assert!(is_bullet_list("<ul><li>Built a thing</li></ul>"));
        assert!(is_bullet_list("  <ul class=\"x\">\n<li>a</li>\n</ul>  "));
        assert!(!is_bullet_list("Built a thing"));
        assert!(!is_bullet_list("<ul></ul>"));
        assert!(!is_bullet_list("<ul><li></li></ul>"));
        assert!(!is_bullet_list("<ul><li>  </li><li><b> </b></li></ul>"));
        assert!(is_bullet_list("<ul><li></li><li><b>Shipped</b> v2</li></ul>"));
    }

    fn profile_skill(name: &str, level: &str, hide: bool, sub_skills: &[&str]) -> Skill {
        Skill {
            name: name.to_string(),
            sub_skills: sub_skills.iter().map(|s| s.to_string()).collect(),
            level: Some(level.to_string()),
            hide,
        }
    }

    #[test]
    fn test_reconcile_skills_keeps_profile_fields() {
        let profile = vec![profile_skill("PHP", "BEGINNER", true, &["Laravel"])];
        let ranked: RankedSkills = decode_response(
            r#"{"rankedSkills": [{"name": "php",
                "subSkills": [
                    {"name": "laravel", "evaluation": {"category": "Relevant", "score": 40}},
                    {"name": "Symfony", "evaluation": {"category": "Relevant", "score": 30}}
                ],
                "evaluation": {"category": "Other", "score": 20}}]}"#,
        )
        .unwrap();

        let ranked = ranked.reconcile(&profile).unwrap();
        let php = &ranked.ranked_skills[0];
        assert_eq!(php.name, "PHP");
        assert_eq!(php.level.as_deref(), Some("BEGINNER"));
        assert!(php.hide);
        assert_eq!(php.evaluation.category, PreferenceCategory::Other);
        assert_eq!(php.sub_skills.len(), 1);
        assert_eq!(php.sub_skills[0].name, "Laravel");
    }

    #[test]
    fn test_reconcile_skills_drops_skills_outside_the_profile() {
        let profile = vec![
            profile_skill("PHP", "BEGINNER", true, &[]),
            profile_skill("React", "PROFICIENT", false, &[]),
        ];
        let ranked: RankedSkills = decode_response(
            r#"{"rankedSkills": [
                {"name": "Kubernetes", "evaluation": {"category": "Preferred", "score": 99}},
                {"name": "React", "evaluation": {"category": "Preferred", "score": 95}},
                {"name": "REACT", "evaluation": {"category": "Other", "score": 5}}
            ], "recommendedSkills": [{"category": "Cloud", "skills": ["Kubernetes"]}]}"#,
        )
        .unwrap();

        let ranked = ranked.reconcile(&profile).unwrap();
        assert_eq!(ranked.ranked_skills.len(), 1);
        assert_eq!(ranked.ranked_skills[0].name, "React");
        assert!((ranked.ranked_skills[0].evaluation.score - 95.0).abs() < f64::EPSILON);
        assert_eq!(ranked.recommended_skills[0].skills, vec!["Kubernetes".to_string()]);
    }

    #[test]
    fn test_reconcile_skills_with_no_profile_match_is_invalid() {
        let profile = vec![profile_skill("PHP", "BEGINNER", false, &[])];
        let ranked: RankedSkills = decode_response(
            r#"{"rankedSkills": [{"name": "Go", "evaluation": {"category": "Preferred", "score": 80}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            ranked.reconcile(&profile),
            Err(StageFailure::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_reconcile_preserves_non_description_fields() {
        let originals = vec![project("p1", "Kanban"), project("p2", "Chat")];
        let generated = vec![
            serde_json::from_value::<Project>(json!({
                "id": "p2",
                "title": "Realtime Chat",
                "description": "<ul><li>Built websockets</li></ul>",
                "techStack": ["Invented"]
            }))
            .unwrap(),
        ];

        let rewritten = reconcile_projects(generated, &originals).unwrap();
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].id.as_deref(), Some("p2"));
        assert_eq!(rewritten[0].title, "Realtime Chat");
        assert_eq!(rewritten[0].description, "<ul><li>Built websockets</li></ul>");
        assert_eq!(rewritten[0].other, originals[1].other);
    }

    #[test]
    fn test_reconcile_falls_back_to_position_and_keeps_title() {
        let originals = vec![project("p1", "Kanban")];
        let generated = vec![serde_json::from_value::<Project>(json!({
            "title": "",
            "description": "<ul><li>Drag and drop</li></ul>"
        }))
        .unwrap()];

        let rewritten = reconcile_projects(generated, &originals).unwrap();
        assert_eq!(rewritten[0].title, "Kanban");
        assert_eq!(rewritten[0].id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_reconcile_never_maps_two_entries_to_one_project() {
        let originals = vec![project("p1", "Kanban"), project("p2", "Chat")];
        let generated = vec![
            serde_json::from_value::<Project>(json!({
                "id": "p2", "title": "Chat", "description": "<ul><li>x</li></ul>"
            }))
            .unwrap(),
            serde_json::from_value::<Project>(json!({
                "id": "p-unknown", "title": "Kanban", "description": "<ul><li>y</li></ul>"
            }))
            .unwrap(),
        ];

        let rewritten = reconcile_projects(generated, &originals).unwrap();
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].id.as_deref(), Some("p2"));
        assert_eq!(rewritten[0].title, "Chat");
    }

    #[test]
    fn test_reconcile_rejects_id_already_claimed_by_position() {
        let originals = vec![project("p1", "Kanban"), project("p2", "Chat")];
        let generated = vec![
            serde_json::from_value::<Project>(json!({
                "title": "", "description": "<ul><li>x</li></ul>"
            }))
            .unwrap(),
            serde_json::from_value::<Project>(json!({
                "id": "p1", "title": "", "description": "<ul><li>y</li></ul>"
            }))
            .unwrap(),
        ];

        assert!(matches!(
            reconcile_projects(generated, &originals),
            Err(StageFailure::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_reconcile_rejects_duplicate_ids() {
        let originals = vec![project("p1", "Kanban"), project("p2", "Chat")];
        let entry = json!({"id": "p1", "title": "Kanban", "description": "<ul><li>x</li></ul>"});
        let generated = vec![
            serde_json::from_value::<Project>(entry.clone()).unwrap(),
            serde_json::from_value::<Project>(entry).unwrap(),
        ];

        assert!(matches!(
            reconcile_projects(generated, &originals),
            Err(StageFailure::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_reconcile_rejects_plain_text_descriptions() {
        let originals = vec![project("p1", "Kanban")];
        let generated = vec![project("p1", "Kanban")];
        assert!(matches!(
            reconcile_projects(generated, &originals),
            Err(StageFailure::InvalidOutput(_))
        ));
    }
}
