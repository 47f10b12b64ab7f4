// Prompt constants for the tailoring stages.
// System instructions fix the task and output schema; templates carry the
// per-job data. JSON_ONLY_INSTRUCTION is appended to every system instruction
// by the processor, and GROUNDING_INSTRUCTION is filled into the ranking and
// rewriting templates.

/// System instruction for the Scrape stage.
pub const SCRAPE_SYSTEM: &str = "You are a job posting extractor. \
    You are given the link to a job posting. Read the posting and return its full job description \
    text: title, company, responsibilities, requirements, qualifications, benefits and any salary \
    or location details, as plain text with line breaks between sections. \
    If the link does not resolve to a job posting, or the posting cannot be read, set \
    success to false and jobDescription to null. \
    Return a JSON object with this EXACT schema: \
    {\"success\": true, \"jobDescription\": \"string or null\"}";

/// Scrape prompt template. Replace `{job_link}` before sending.
pub const SCRAPE_PROMPT_TEMPLATE: &str = r#"Extract the job description from this job posting link:

{job_link}"#;

/// System instruction for the Analyze stage.
pub const ANALYZE_SYSTEM: &str = "You are an expert job description analyst and resume strategist. \
    Parse a job description and extract structured requirements.";

/// Analyze prompt template. Replace `{job_description}` before sending.
pub const ANALYZE_PROMPT_TEMPLATE: &str = r#"Analyze the following job description.

Return a JSON object with this EXACT schema (no extra fields):
{
  "jobTitle": "Frontend Engineer",
  "requiredSkills": ["React", "TypeScript"],
  "preferredSkills": ["GraphQL"],
  "tools": ["Git", "Jira"],
  "responsibilities": ["Build reusable UI components"],
  "education": "Bachelor's degree in Computer Science or equivalent" | null,
  "experienceLevel": "junior" | "mid" | "senior" | "lead" | null,
  "location": "Remote (EU)" | null,
  "salaryRange": "€60,000 - €75,000" | null,
  "employmentType": "full-time" | "part-time" | "contract" | "internship" | null
}

Rules:
- REQUIRED SKILLS: explicit must-haves ("required", "must have", "you will need", minimum years).
- PREFERRED SKILLS: nice-to-haves ("preferred", "bonus", "nice to have", "plus").
- TOOLS: named software, platforms and services that are not programming skills.
- Use the exact skill names written in the posting; do not expand or rename them.
- Use null for anything the posting does not state.

JOB DESCRIPTION:
{job_description}"#;

/// System instruction for the Rank Projects stage.
pub const RANK_PROJECTS_SYSTEM: &str = "You are a technical recruiter ranking a candidate's \
    projects by relevance to a job's requirements.";

/// Rank Projects prompt template.
/// Replace: {grounding_instruction}, {requirements_json}, {projects_json}
pub const RANK_PROJECTS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

JOB REQUIREMENTS:
{requirements_json}

CANDIDATE PROJECTS:
{projects_json}

Score every project from 0 to 100 by how well it demonstrates the job's required and preferred
skills, tools and responsibilities. Return a JSON object:
{
  "rankedProjects": [
    {
      "projectId": "the project's id, or null if it has none",
      "title": "the project's exact title",
      "score": 87,
      "matchedSkills": ["React", "REST APIs"],
      "reason": "one sentence on why it scored this way"
    }
  ],
  "unsortedProjects": [ same objects as rankedProjects, in the input order ],
  "averageScore": 64.5
}

HARD RULES:
1. Include EVERY project exactly once in rankedProjects (sorted by score, highest first) and in unsortedProjects
2. matchedSkills may only name skills that appear in BOTH the job requirements and the project
3. score is an integer between 0 and 100"#;

/// System instruction for the Rank Skills stage.
pub const RANK_SKILLS_SYSTEM: &str = "You are a technical recruiter evaluating a candidate's \
    skills against a job's requirements.";

/// Rank Skills prompt template.
/// Replace: {grounding_instruction}, {requirements_json}, {ranked_projects_json}, {skills_json}
pub const RANK_SKILLS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

JOB REQUIREMENTS:
{requirements_json}

CANDIDATE PROJECTS RANKED FOR THIS JOB:
{ranked_projects_json}

CANDIDATE SKILLS:
{skills_json}

Evaluate every skill and every sub-skill. Return a JSON object:
{
  "rankedSkills": [
    {
      "name": "React",
      "level": "PROFICIENT",
      "hide": false,
      "subSkills": [
        {"name": "Hooks", "evaluation": {"category": "Relevant", "score": 72}}
      ],
      "evaluation": {"category": "Preferred", "score": 95}
    }
  ],
  "recommendedSkills": [
    {"category": "Testing", "skills": ["Jest", "Cypress"]}
  ]
}

CATEGORIES (pick exactly one per skill and sub-skill):
- "Preferred": the job names this skill, or it directly satisfies a required or preferred skill
- "Relevant": not named, but closely related to the job's stack or responsibilities
- "Other": unrelated to this job

HARD RULES:
1. Keep every skill's name, level and hide values exactly as given; keep every sub-skill
2. Order rankedSkills by score, highest first
3. score is an integer between 0 and 100
4. recommendedSkills lists skills the job asks for that the candidate does NOT have, grouped by category"#;

/// System instruction for the Generate Descriptions stage.
pub const GENERATE_DESCRIPTIONS_SYSTEM: &str = "You are an expert resume writer rewriting \
    project descriptions so they speak to a specific job.";

/// Generate Descriptions prompt template.
/// Replace: {grounding_instruction}, {requirements_json}, {ranked_skills_json}, {projects_json}
pub const GENERATE_DESCRIPTIONS_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

JOB REQUIREMENTS:
{requirements_json}

CANDIDATE SKILLS EVALUATED FOR THIS JOB:
{ranked_skills_json}

CANDIDATE PROJECTS (source of truth):
{projects_json}

Rewrite each project's description. Return a JSON ARRAY with one object per project, in input order:
[
  {
    "id": "the project's id, unchanged",
    "title": "the project's title, lightly polished if it helps",
    "description": "<ul><li>Built ...</li><li>Reduced ...</li></ul>"
  }
]

HARD RULES:
1. description MUST be an HTML bullet list: <ul> containing 2 to 4 <li> items, nothing else
2. Start every bullet with a strong past-tense verb
3. Surface the job's Preferred skills where the project genuinely used them; never force-fit
4. Keep every other project field unchanged; do not add or drop projects"#;

/// Follow-up turn sent when a response could not be decoded.
/// Replace `{error}` before sending.
pub const REPROMPT_TEMPLATE: &str = "Your previous reply could not be parsed ({error}). \
    Reply again with ONLY the JSON value described above.";
