// All model prompt constants for the pipeline stages, plus the payload
// builders that fill their {placeholders} before sending.

use crate::models::job::{CompanyFacts, ConsolidatedInput};

/// System prompt for requisition structuring. Enforces JSON-only output.
pub const STRUCTURE_SYSTEM: &str = "You are an expert recruitment analyst. \
    Extract a structured job requisition from free-form hiring notes. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent details that are not in the notes.";

/// Structuring prompt template. Replace `{raw_text}` before sending.
pub const STRUCTURE_PROMPT_TEMPLATE: &str = r#"Extract the job requisition from the following hiring notes.

Return a JSON object with this EXACT schema (no extra fields):
{
  "company_name": "ACME corp",
  "job_title": "Backend Engineer",
  "job_type": "full_time",
  "experience_level": "3+ years",
  "requirements": ["Rust experience", "PostgreSQL"],
  "preferred_qualifications": ["Kubernetes"],
  "benefits": ["Remote work"],
  "location": "Berlin",
  "salary_range": "70000-90000 EUR"
}

Rules for extraction:
- job_type is one of "full_time", "part_time", "contract", "internship". Use "full_time" when the notes do not say.
- Use null for experience_level, location and salary_range when the notes do not mention them.
- Use [] for list fields with nothing to extract.
- company_name and job_title are required; copy them as written in the notes.
- Keep every requirement exactly as stated, including ones that look problematic. Reviewing them is a later step, not yours.

HIRING NOTES:
{raw_text}"#;

/// System prompt for the sensitivity review agent. Findings are never fixed
/// silently: each one becomes a question for the human reviewer.
pub const SENSITIVITY_SYSTEM: &str = r#"You are a hiring-compliance reviewer. You receive a structured job requisition as JSON, possibly followed by a transcript of questions you asked earlier and the answers a human reviewer gave.

Review the requisition for discriminatory, exclusionary or legally risky content: references to protected characteristics (gender, age, race, religion, nationality, disability, family status), indirectly exclusionary phrasing, and demands that conflict with labor law.

You MUST respond with valid JSON only, in exactly one of these two forms:

{"action": "request_human_input", "questions": ["<one concise question per finding>"]}

{"action": "final", "revised": <the full revised requisition object, or null if nothing changed>, "reasoning": "<one or two sentences>"}

HARD RULES:
1. If you find problematic content and have no human guidance on it yet, you MUST use request_human_input. NEVER remove or soften content on your own authority.
2. Apply the human answers exactly: keep what they say to keep, remove or rephrase what they say to change.
3. When you revise, return the COMPLETE requisition object with the same schema you received, never a fragment.
4. When nothing needs changing, use action "final" with revised null.
5. Do NOT use markdown code fences."#;

/// System prompt for the consistency review agent. Internal contradictions
/// are fixed directly; only unverifiable company claims go to the human.
pub const CONSISTENCY_SYSTEM: &str = r#"You are a fact-consistency reviewer for job postings. You receive a draft posting together with its provenance (per-field sources, a 0-100 completeness score and reliability indicators), possibly followed by a transcript of questions you asked earlier and the answers a human reviewer gave.

Check two things:
1. Internal consistency: the draft must not contradict itself (title vs body, requirements vs benefits, mismatched locations or salary figures).
2. Verifiability: company facts in the draft must be backed by the provenance. Fields sourced from the reference store count as verified. When the provenance says user_provided_only or potential_hallucination_risk, any company claim beyond the bare name is unverified.

You MUST respond with valid JSON only, in exactly one of these two forms:

{"action": "request_human_input", "questions": ["<one concise question per unverifiable claim>"]}

{"action": "final", "revised": <the full revised draft object, or null if nothing changed>, "reasoning": "<one or two sentences>"}

HARD RULES:
1. Fix internal contradictions yourself in the revised draft; do not ask the human about them.
2. Ask the human ONLY about unverifiable company claims the provenance cannot settle.
3. When you revise, return the COMPLETE draft object with the same schema you received, never a fragment.
4. When nothing needs changing, use action "final" with revised null.
5. Do NOT use markdown code fences."#;

/// System prompt for draft generation. Enforces JSON-only output.
pub const DRAFT_SYSTEM: &str = "You are an expert job-posting copywriter. \
    Write a complete, professional posting from consolidated requisition facts. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT invent company facts beyond the ones provided.";

/// Draft prompt template.
/// Replace: {company_facts}, {job_title}, {job_type}, {experience_level},
///          {requirements}, {preferred_qualifications}, {benefits},
///          {location}, {salary_range}
pub const DRAFT_PROMPT_TEMPLATE: &str = r#"Write a job posting from the following consolidated input.

Return a JSON object with this EXACT schema (no extra fields):
{
  "title": "Backend Engineer at ACME corp",
  "company_name": "ACME corp",
  "company_introduction": "One short paragraph about the company.",
  "responsibilities": ["What the hire will do"],
  "requirements": ["Hard requirements"],
  "preferred_qualifications": ["Nice-to-haves"],
  "benefits": ["What the company offers"],
  "location": "Berlin",
  "salary_range": "70000-90000 EUR",
  "application_notice": "How to apply"
}

COMPANY FACTS (the ONLY company facts you may use):
{company_facts}

POSITION:
- title: {job_title}
- employment type: {job_type}
- experience level: {experience_level}

REQUIREMENTS:
{requirements}

PREFERRED QUALIFICATIONS:
{preferred_qualifications}

BENEFITS:
{benefits}

LOCATION: {location}
SALARY RANGE: {salary_range}

HARD RULES:
1. company_name in the output must be exactly the name given in the company facts.
2. Base company_introduction ONLY on the company facts; when only the name is known, keep it to one neutral sentence.
3. Carry over every requirement, qualification and benefit; rephrase for tone but never drop or add items.
4. Derive responsibilities from the title and requirements; keep them concrete.
5. Use null for location, salary_range and application_notice when the input says "unspecified"."#;

/// Fills the structuring template.
pub fn structure_payload(raw_text: &str) -> String {
    STRUCTURE_PROMPT_TEMPLATE.replace("{raw_text}", raw_text)
}

/// Fills the draft template from the consolidated input. Pure string work,
/// cannot fail.
pub fn draft_payload(input: &ConsolidatedInput) -> String {
    DRAFT_PROMPT_TEMPLATE
        .replace("{company_facts}", &render_company_facts(&input.company))
        .replace("{job_title}", &input.job_title)
        .replace("{job_type}", input.job_type.as_str())
        .replace(
            "{experience_level}",
            input.experience_level.as_deref().unwrap_or("unspecified"),
        )
        .replace("{requirements}", &render_list(&input.requirements))
        .replace(
            "{preferred_qualifications}",
            &render_list(&input.preferred_qualifications),
        )
        .replace("{benefits}", &render_list(&input.benefits))
        .replace(
            "{location}",
            input.location.as_deref().unwrap_or("unspecified"),
        )
        .replace(
            "{salary_range}",
            input.salary_range.as_deref().unwrap_or("unspecified"),
        )
}

fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_company_facts(facts: &CompanyFacts) -> String {
    let mut lines = vec![format!("- name: {}", facts.name)];
    if let Some(industry) = &facts.industry {
        lines.push(format!("- industry: {industry}"));
    }
    if let Some(location) = &facts.location {
        lines.push(format!("- location: {location}"));
    }
    if let Some(count) = facts.employee_count {
        lines.push(format!("- employees: {count}"));
    }
    if let Some(year) = facts.founded_year {
        lines.push(format!("- founded: {year}"));
    }
    if let Some(website) = &facts.website {
        lines.push(format!("- website: {website}"));
    }
    if let Some(description) = &facts.description {
        lines.push(format!("- description: {description}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobType;

    #[test]
    fn test_structure_payload_embeds_notes() {
        let payload = structure_payload("ACME corp needs a backend engineer");
        assert!(payload.contains("ACME corp needs a backend engineer"));
        assert!(!payload.contains("{raw_text}"));
    }

    #[test]
    fn test_draft_payload_renders_sparse_input() {
        let input = ConsolidatedInput {
            company: CompanyFacts::name_only("ACME corp"),
            job_title: "Backend Engineer".to_string(),
            job_type: JobType::FullTime,
            experience_level: None,
            requirements: vec!["Rust".to_string()],
            preferred_qualifications: Vec::new(),
            benefits: Vec::new(),
            location: None,
            salary_range: None,
        };

        let payload = draft_payload(&input);
        assert!(payload.contains("- name: ACME corp"));
        assert!(payload.contains("- Rust"));
        assert!(payload.contains("LOCATION: unspecified"));
        assert!(payload.contains("PREFERRED QUALIFICATIONS:\nnone"));
        assert!(!payload.contains("{job_title}"));
    }

    #[test]
    fn test_company_facts_render_only_known_fields() {
        let mut facts = CompanyFacts::name_only("ACME corp");
        facts.industry = Some("logistics".to_string());
        let rendered = render_company_facts(&facts);
        assert_eq!(rendered, "- name: ACME corp\n- industry: logistics");
    }
}
