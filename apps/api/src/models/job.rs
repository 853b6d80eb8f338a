//! Job requisition and posting models shared across the pipeline stages.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Job type: canonical enum, normalized once at the boundary
// ────────────────────────────────────────────────────────────────────────────

/// Employment type for a posting.
///
/// Providers and callers send free-form strings ("Full-Time", "full time",
/// "contractor"); deserialization funnels them all through [`JobType::parse`]
/// so downstream code only ever sees the canonical enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl JobType {
    /// Parses a free-form employment-type string. Unrecognized input yields
    /// `None`; deserialization falls back to the default.
    pub fn parse(raw: &str) -> Option<JobType> {
        let normalized: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "full_time" | "fulltime" | "permanent" | "regular" => Some(JobType::FullTime),
            "part_time" | "parttime" => Some(JobType::PartTime),
            "contract" | "contractor" | "freelance" | "temporary" => Some(JobType::Contract),
            "internship" | "intern" => Some(JobType::Internship),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full_time",
            JobType::PartTime => "part_time",
            JobType::Contract => "contract",
            JobType::Internship => "internship",
        }
    }
}

impl<'de> Deserialize<'de> for JobType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(JobType::parse(&raw).unwrap_or_default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Structured request: stage 1 output
// ────────────────────────────────────────────────────────────────────────────

/// The structured job requisition extracted from raw text by stage 1 and
/// reviewed by the sensitivity validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub experience_level: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Consolidated input: stage 4 output, shaped for generation
// ────────────────────────────────────────────────────────────────────────────

/// Company facts folded into the generation input. When the reference store
/// had no match, only `name` is populated (user-supplied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyFacts {
    pub name: String,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub employee_count: Option<i32>,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CompanyFacts {
    /// Facts known only by name, for the no-match and store-error paths.
    pub fn name_only(name: impl Into<String>) -> Self {
        CompanyFacts {
            name: name.into(),
            industry: None,
            location: None,
            employee_count: None,
            founded_year: None,
            website: None,
            description: None,
        }
    }
}

/// Merge of the validated request and the retrieved company facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedInput {
    pub company: CompanyFacts,
    pub job_title: String,
    pub job_type: JobType,
    #[serde(default)]
    pub experience_level: Option<String>,
    pub requirements: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
}

/// One cheap structural check run during consolidation. Failures become
/// workflow warnings, never stage failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Draft: stage 5 output, reviewed by the consistency validator
// ────────────────────────────────────────────────────────────────────────────

/// The candidate job posting. Immutable after consistency validation except
/// by explicit validator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPostingDraft {
    pub title: String,
    pub company_name: String,
    #[serde(default)]
    pub company_introduction: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub application_notice: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
