// Shared prompt fragments. Each stage's own instructions live in
// pipeline/prompts.rs and embed these.

/// Appended to every stage instruction.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Used by the ranking and rewriting stages.
pub const GROUNDING_INSTRUCTION: &str = "Use ONLY facts present in the provided profile data. \
    Do NOT invent projects, skills, employers, metrics or links. \
    If the profile does not support a claim, omit it.";
